//! Prompt library for the classification backend
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/facturia/prompts/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Prompt files start with YAML frontmatter (`id`, `version`) followed by
//! `# System` and `# User` sections. Templates use `{{var}}` placeholders and
//! `{{#if var}}...{{/if}}` blocks that are dropped when `var` is empty.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{Attachment, Direction};
use crate::vocabulary::Vocabulary;

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const CLASSIFY_DOCUMENT: &str = include_str!("../../../prompts/classify_document.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    ClassifyDocument,
}

impl PromptId {
    /// Get the string identifier for this prompt
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClassifyDocument => "classify_document",
        }
    }

    pub fn all() -> &'static [PromptId] {
        &[Self::ClassifyDocument]
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::ClassifyDocument => defaults::CLASSIFY_DOCUMENT,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    pub version: u32,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    /// The prompt content (system + user sections)
    pub content: String,
    /// Path of the override file this came from, if any
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render system and user sections as one text with variables replaced
    ///
    /// Vision endpoints take a single text part, so the sections are joined.
    pub fn render(&self, vars: &HashMap<&str, &str>) -> String {
        let text = match (self.system_section(), self.user_section()) {
            (Some(system), Some(user)) => format!("{}\n\n{}", system, user),
            (None, Some(user)) => user.to_string(),
            _ => self.content.clone(),
        };
        render_template(&text, vars)
    }
}

/// Prompt library for loading and caching prompts
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Create a prompt library with default paths
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with a custom override directory
    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with no override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Get a prompt by ID, loading from override or default
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        if !self.cache.contains_key(&id) {
            let prompt = self.load(id)?;
            self.cache.insert(id, prompt);
        }
        self.cache
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("prompt {}", id.as_str())))
    }

    fn load(&self, id: PromptId) -> Result<Prompt> {
        if let Some(ref override_dir) = self.override_dir {
            let override_path = override_dir.join(format!("{}.md", id.as_str()));
            if override_path.exists() {
                let content = fs::read_to_string(&override_path).map_err(|e| {
                    Error::InvalidData(format!("Failed to read prompt override: {}", e))
                })?;
                let (metadata, body) = parse_prompt(&content)?;
                return Ok(Prompt {
                    metadata,
                    content: body,
                    override_path: Some(override_path),
                });
            }
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
            override_path: None,
        })
    }

    /// Render the document classification prompt
    ///
    /// Vocabulary lists come from configuration; extracted text is cut to
    /// `max_text_chars` characters.
    pub fn classification_prompt(
        &mut self,
        vocabulary: &Vocabulary,
        attachment: &Attachment,
        max_text_chars: usize,
    ) -> Result<String> {
        let income = bullet_list(vocabulary.terms(Direction::Income));
        let expense = bullet_list(vocabulary.terms(Direction::Expense));
        let context = attachment.context();
        let text: String = attachment
            .extracted_text
            .as_deref()
            .map(|t| t.trim().chars().take(max_text_chars).collect())
            .unwrap_or_default();

        let mut vars = HashMap::new();
        vars.insert("income_categories", income.as_str());
        vars.insert("expense_categories", expense.as_str());
        vars.insert("context", context.as_str());
        vars.insert("extracted_text", text.as_str());

        Ok(self.get(PromptId::ClassifyDocument)?.render(&vars))
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("facturia").join("prompts"))
}

fn bullet_list(terms: &[String]) -> String {
    terms
        .iter()
        .map(|t| format!("- {}", t))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    let rest = content.strip_prefix("---").ok_or_else(|| {
        Error::InvalidData("Prompt must start with YAML frontmatter (---)".into())
    })?;

    let end = rest.find("---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::InvalidData(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

/// Extract a section from the prompt content
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];
    let end = after_header.find("\n# ").unwrap_or(after_header.len());
    Some(after_header[..end].trim())
}

/// Substitute `{{var}}` placeholders and resolve `{{#if var}}` blocks
fn render_template(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = resolve_conditionals(template, vars);
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result.trim().to_string()
}

/// Keep `{{#if var}}` blocks whose variable is non-empty, drop the rest
fn resolve_conditionals(content: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = content.to_string();

    while let Some(if_start) = result.find("{{#if ") {
        let var_start = if_start + 6;
        let Some(var_len) = result[var_start..].find("}}") else {
            break;
        };
        let var_name = result[var_start..var_start + var_len].trim().to_string();
        let block_start = var_start + var_len + 2;
        let Some(endif_offset) = result[block_start..].find("{{/if}}") else {
            break;
        };
        let block = result[block_start..block_start + endif_offset].to_string();
        let block_end = block_start + endif_offset + "{{/if}}".len();

        let keep = vars.get(var_name.as_str()).is_some_and(|v| !v.is_empty());
        let replacement = if keep { block.as_str() } else { "" };
        result = format!("{}{}{}", &result[..if_start], replacement, &result[block_end..]);
    }

    result
}
