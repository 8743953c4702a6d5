//! Pipeline configuration
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path, or the override in the data dir
//!    (~/.local/share/facturia/config.toml)
//! 2. The embedded default (compiled into the binary)
//!
//! Sections other than `[vocabulary]` are optional in an override; missing
//! values keep their built-in defaults.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::ai::retry::{BreakerConfig, RetryPolicy};
use crate::categorize::{Categorizer, KeywordRule};
use crate::error::{Error, Result};
use crate::models::Direction;
use crate::vocabulary::{CategoryResolver, Vocabulary};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/facturia.toml");

/// Where the active config came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    Embedded,
    File(PathBuf),
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Embedded => write!(f, "embedded defaults"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Settings for the classification backend call
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Per-request timeout
    pub timeout: Duration,
    /// Characters of extracted document text sent with the prompt
    pub max_text_chars: usize,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_text_chars: 500,
        }
    }
}

/// Ordered keyword tables, one per direction
#[derive(Debug, Clone, Default)]
pub struct KeywordTables {
    pub income: Vec<KeywordRule>,
    pub expense: Vec<KeywordRule>,
}

impl KeywordTables {
    pub fn rules(&self, direction: Direction) -> &[KeywordRule] {
        match direction {
            Direction::Income => &self.income,
            Direction::Expense => &self.expense,
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub vocabulary: Vocabulary,
    pub synonyms: HashMap<String, String>,
    pub keywords: KeywordTables,
    pub retry: RetryPolicy,
    pub breaker: BreakerConfig,
    pub backend: BackendSettings,
    pub source: ConfigSource,
}

impl PipelineConfig {
    /// Load config (override first, then embedded default)
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let path = match override_path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };

        match path {
            Some(path) if path.exists() => Self::from_file(&path),
            Some(path) if override_path.is_some() => Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            ))),
            _ => Self::embedded(),
        }
    }

    /// Parse the embedded default config
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG, ConfigSource::Embedded)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        parse_config(&content, ConfigSource::File(path.to_path_buf()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        parse_config(content, ConfigSource::Embedded)
    }

    /// Category resolver over this vocabulary and synonym table
    pub fn resolver(&self) -> CategoryResolver {
        CategoryResolver::new(self.vocabulary.clone(), self.synonyms.clone())
    }

    /// Keyword categorizer over this vocabulary and keyword tables
    pub fn categorizer(&self) -> Result<Categorizer> {
        Categorizer::new(self.vocabulary.clone(), &self.keywords)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("facturia").join("config.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    vocabulary: Option<RawVocabulary>,
    synonyms: Option<HashMap<String, String>>,
    keywords: Option<RawKeywords>,
    retry: Option<RawRetry>,
    breaker: Option<RawBreaker>,
    backend: Option<RawBackend>,
}

#[derive(Debug, Deserialize)]
struct RawVocabulary {
    income: Vec<String>,
    income_catch_all: String,
    expense: Vec<String>,
    expense_catch_all: String,
}

#[derive(Debug, Deserialize)]
struct RawKeywords {
    #[serde(default)]
    income: Vec<RawKeywordRule>,
    #[serde(default)]
    expense: Vec<RawKeywordRule>,
}

#[derive(Debug, Deserialize)]
struct RawKeywordRule {
    category: String,
    keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawRetry {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    rate_limit_delay_ms: Option<u64>,
    rate_limit_max_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawBreaker {
    failure_threshold: Option<u32>,
    cooldown_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawBackend {
    timeout_secs: Option<u64>,
    max_text_chars: Option<usize>,
}

/// Parse and validate config from TOML content
fn parse_config(content: &str, source: ConfigSource) -> Result<PipelineConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let vocab = raw
        .vocabulary
        .ok_or_else(|| Error::Config("Missing [vocabulary] section".into()))?;
    let vocabulary = Vocabulary::new(
        vocab.income,
        vocab.expense,
        &vocab.income_catch_all,
        &vocab.expense_catch_all,
    )?;

    let synonyms = raw.synonyms.unwrap_or_default();
    for (hint, target) in &synonyms {
        if vocabulary.direction_of(target).is_none() {
            return Err(Error::Config(format!(
                "Synonym '{}' targets unknown category '{}'",
                hint, target
            )));
        }
    }

    let mut keywords = KeywordTables::default();
    if let Some(raw_keywords) = raw.keywords {
        keywords.income = keyword_rules(raw_keywords.income, Direction::Income, &vocabulary)?;
        keywords.expense = keyword_rules(raw_keywords.expense, Direction::Expense, &vocabulary)?;
    }

    let mut retry = RetryPolicy::default();
    if let Some(r) = raw.retry {
        if let Some(attempts) = r.max_attempts {
            if attempts == 0 {
                return Err(Error::Config("retry.max_attempts must be at least 1".into()));
            }
            retry.max_attempts = attempts;
        }
        if let Some(ms) = r.base_delay_ms {
            retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = r.max_delay_ms {
            retry.max_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = r.rate_limit_delay_ms {
            retry.rate_limit_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = r.rate_limit_max_delay_ms {
            retry.rate_limit_max_delay = Duration::from_millis(ms);
        }
    }

    let mut breaker = BreakerConfig::default();
    if let Some(b) = raw.breaker {
        if let Some(threshold) = b.failure_threshold {
            if threshold == 0 {
                return Err(Error::Config(
                    "breaker.failure_threshold must be at least 1".into(),
                ));
            }
            breaker.failure_threshold = threshold;
        }
        if let Some(secs) = b.cooldown_secs {
            breaker.cooldown = Duration::from_secs(secs);
        }
    }

    let mut backend = BackendSettings::default();
    if let Some(b) = raw.backend {
        if let Some(secs) = b.timeout_secs {
            backend.timeout = Duration::from_secs(secs);
        }
        if let Some(chars) = b.max_text_chars {
            backend.max_text_chars = chars;
        }
    }

    Ok(PipelineConfig {
        vocabulary,
        synonyms,
        keywords,
        retry,
        breaker,
        backend,
        source,
    })
}

fn keyword_rules(
    raw: Vec<RawKeywordRule>,
    direction: Direction,
    vocabulary: &Vocabulary,
) -> Result<Vec<KeywordRule>> {
    raw.into_iter()
        .map(|rule| {
            if !vocabulary.contains(direction, &rule.category) {
                return Err(Error::Config(format!(
                    "Keyword category '{}' is not a {} category",
                    rule.category, direction
                )));
            }
            Ok(KeywordRule {
                category: rule.category.trim().to_lowercase(),
                keywords: rule
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[vocabulary]
income = ["sueldo", "otro_ingreso"]
income_catch_all = "otro_ingreso"
expense = ["salud", "otro_egreso"]
expense_catch_all = "otro_egreso"
"#;

    #[test]
    fn test_embedded_config_parses() {
        let config = PipelineConfig::embedded().unwrap();
        assert_eq!(config.source, ConfigSource::Embedded);
        assert_eq!(config.vocabulary.terms(Direction::Income).len(), 6);
        assert_eq!(config.vocabulary.terms(Direction::Expense).len(), 8);
        assert_eq!(config.vocabulary.catch_all(Direction::Expense), "otro_egreso");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.breaker.failure_threshold, 10);
        assert_eq!(config.breaker.cooldown, Duration::from_secs(120));
        assert_eq!(config.backend.max_text_chars, 500);
    }

    #[test]
    fn test_keyword_order_is_preserved() {
        let config = PipelineConfig::embedded().unwrap();
        let expense: Vec<&str> = config
            .keywords
            .expense
            .iter()
            .map(|r| r.category.as_str())
            .collect();
        assert_eq!(
            expense,
            vec![
                "factura_servicios",
                "supermercado",
                "impuestos",
                "alquiler",
                "combustible",
                "salud",
                "entretenimiento"
            ]
        );
        assert_eq!(config.keywords.income[0].category, "sueldo");
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = PipelineConfig::from_toml(MINIMAL).unwrap();
        assert!(config.synonyms.is_empty());
        assert!(config.keywords.expense.is_empty());
        assert_eq!(config.retry.max_attempts, RetryPolicy::default().max_attempts);
        assert_eq!(config.backend.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_vocabulary_rejected() {
        let err = PipelineConfig::from_toml("[retry]\nmax_attempts = 2\n").unwrap_err();
        assert!(err.to_string().contains("vocabulary"));
    }

    #[test]
    fn test_synonym_to_unknown_category_rejected() {
        let toml = format!("{}\n[synonyms]\nviaje = \"turismo\"\n", MINIMAL);
        assert!(PipelineConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn test_keyword_category_must_match_direction() {
        let toml = format!(
            "{}\n[[keywords.income]]\ncategory = \"salud\"\nkeywords = [\"osde\"]\n",
            MINIMAL
        );
        assert!(PipelineConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let toml = format!("{}\n[retry]\nmax_attempts = 0\n", MINIMAL);
        assert!(PipelineConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn test_load_explicit_missing_file_errors() {
        let missing = Path::new("/nonexistent/facturia/config.toml");
        assert!(PipelineConfig::load(Some(missing)).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, MINIMAL).unwrap();
        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.source, ConfigSource::File(path));
        assert!(config.vocabulary.contains(Direction::Expense, "SALUD"));
    }
}
