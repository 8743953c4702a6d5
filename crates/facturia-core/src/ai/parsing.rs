//! Parsing of raw classification responses
//!
//! Models wrap their JSON in code fences, add prose around it, use smart
//! quotes, or answer with Python-style literals (`'tipo': 'egreso'`,
//! `None`, trailing commas). Parsing tries, in order:
//!
//! 1. strict JSON on the fence-stripped text
//! 2. strict JSON on the first balanced `{...}` object in the text
//! 3. a lenient pass that normalizes quotes and literals, then parses again
//!
//! If every strategy fails the response is a `ParseFailure`.

use serde_json::Value;
use tracing::debug;

use crate::error::Rejection;

use super::types::RawClassification;

/// Longest raw excerpt carried in a `ParseFailure`
const EXCERPT_CHARS: usize = 200;

/// Parse a raw backend response into its fields
pub fn parse_classification_response(raw: &str) -> Result<RawClassification, Rejection> {
    let object = parse_json_object(raw)?;
    serde_json::from_value(Value::Object(object))
        .map_err(|e| Rejection::ParseFailure(format!("{} | Raw: {}", e, excerpt(raw))))
}

/// Find and parse the JSON object in a response
pub fn parse_json_object(raw: &str) -> Result<serde_json::Map<String, Value>, Rejection> {
    let stripped = strip_code_fences(raw);
    if stripped.is_empty() {
        return Err(Rejection::ParseFailure("empty response".into()));
    }

    if let Some(obj) = strict(stripped) {
        return Ok(obj);
    }

    if let Some(candidate) = extract_first_json_object(stripped) {
        if let Some(obj) = strict(candidate) {
            debug!("Parsed classification after extracting embedded object");
            return Ok(obj);
        }
    }

    let quoted = normalize_quotes(stripped);
    let span = match (quoted.find('{'), quoted.rfind('}')) {
        (Some(s), Some(e)) if s < e => &quoted[s..=e],
        _ => quoted.as_str(),
    };
    if let Some(obj) = strict(&literal_to_json(span)) {
        debug!("Parsed classification with lenient literal parsing");
        return Ok(obj);
    }

    Err(Rejection::ParseFailure(format!(
        "no JSON object found | Raw: {}",
        excerpt(raw)
    )))
}

/// Parse as JSON; accept an object, or an array whose first element is one
fn strict(s: &str) -> Option<serde_json::Map<String, Value>> {
    match serde_json::from_str::<Value>(s.trim()).ok()? {
        Value::Object(obj) => Some(obj),
        Value::Array(items) => items.into_iter().find_map(|v| match v {
            Value::Object(obj) => Some(obj),
            _ => None,
        }),
        _ => None,
    }
}

/// Remove Markdown code fences (```json ... ```)
pub fn strip_code_fences(raw: &str) -> &str {
    let s = raw.trim();
    let Some(open) = s.find("```") else {
        return s;
    };
    let after_open = &s[open + 3..];
    // Skip the language tag on the fence line
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// First balanced `{...}` object, aware of strings and escapes
fn extract_first_json_object(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (idx, c) in input[start..].char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match c {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&input[start..=start + idx]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Replace typographic quotes with ASCII ones
fn normalize_quotes(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{00AB}' | '\u{00BB}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' => '\'',
            other => other,
        })
        .collect()
}

/// Rewrite a Python-literal-style object as JSON
///
/// Single-quoted strings become double-quoted, `True`/`False`/`None` become
/// `true`/`false`/`null`, and trailing commas before `}` or `]` are dropped.
/// Text inside strings is left untouched apart from quote escaping.
fn literal_to_json(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            match c {
                '\\' if i + 1 < chars.len() => {
                    let next = chars[i + 1];
                    if q == '\'' && next == '\'' {
                        out.push('\'');
                    } else {
                        out.push('\\');
                        out.push(next);
                    }
                    i += 2;
                    continue;
                }
                '"' if q == '\'' => out.push_str("\\\""),
                _ if c == q => {
                    out.push('"');
                    quote = None;
                }
                _ => out.push(c),
            }
            i += 1;
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push('"');
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(',');
                }
            }
            c if c.is_alphabetic() => {
                let word: String = chars[i..]
                    .iter()
                    .take_while(|c| c.is_alphanumeric() || **c == '_')
                    .collect();
                let len = word.chars().count();
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    _ => word.as_str(),
                });
                i += len;
                continue;
            }
            _ => out.push(c),
        }
        i += 1;
    }

    out
}

fn excerpt(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() > EXCERPT_CHARS {
        format!("{}...", trimmed.chars().take(EXCERPT_CHARS).collect::<String>())
    } else {
        trimmed.to_string()
    }
}
