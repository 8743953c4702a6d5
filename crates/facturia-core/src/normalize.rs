//! Value normalization for amounts and dates
//!
//! Amounts arrive as locale-formatted strings ("$1.234,56", "1,234.56",
//! "AR$ 500"). Dates arrive as anything from ISO strings to "15/03/2024".
//! Amount parsing for classification responses is strict (must be > 0);
//! date parsing always fails soft.

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::error::Rejection;

/// Currency markers removed before parsing. Longer tokens first so "AR$"
/// is not left as "AR" after "$" is stripped.
const CURRENCY_TOKENS: &[&str] = &["AR$", "US$", "USD", "ARS", "EUR", "$", "€", "£"];

/// Clean a locale-formatted amount into a signed number
///
/// Separator rules:
/// - both `.` and `,` present: the one appearing last is the decimal marker
/// - only `,`: several occurrences are thousands separators, a single one is
///   the decimal marker
/// - only `.` or neither: parsed as-is
///
/// A value wrapped in parentheses is negative. Returns `None` when nothing
/// numeric remains.
pub fn clean_amount(raw: &str) -> Option<f64> {
    let mut s = raw.trim().to_uppercase();

    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
        negative = true;
        s = s[1..s.len() - 1].to_string();
    }

    for token in CURRENCY_TOKENS {
        s = s.replace(token, "");
    }
    s.retain(|c| !c.is_whitespace());

    if s.is_empty() {
        return None;
    }

    let last_dot = s.rfind('.');
    let last_comma = s.rfind(',');
    let normalized = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (None, Some(_)) => {
            if s.matches(',').count() > 1 {
                s.replace(',', "")
            } else {
                s.replace(',', ".")
            }
        }
        _ => s,
    };

    // Rust's float parser accepts "inf" and "nan"; neither is an amount
    if !normalized
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
    {
        return None;
    }

    let value = normalized.parse::<f64>().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value.abs() } else { value })
}

/// Parse an amount that must be strictly positive
pub fn parse_amount(raw: &str) -> Result<f64, Rejection> {
    let value = clean_amount(raw).ok_or_else(|| Rejection::InvalidAmount(raw.to_string()))?;
    require_positive(value, raw)
}

/// Reject zero, negative and non-finite values
pub fn require_positive(value: f64, raw: &str) -> Result<f64, Rejection> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Rejection::InvalidAmount(raw.to_string()))
    }
}

/// A date as it arrives: already structured, or free text
#[derive(Debug, Clone, Copy)]
pub enum DateInput<'a> {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Text(&'a str),
}

impl<'a> From<&'a str> for DateInput<'a> {
    fn from(s: &'a str) -> Self {
        DateInput::Text(s)
    }
}

impl From<NaiveDate> for DateInput<'_> {
    fn from(d: NaiveDate) -> Self {
        DateInput::Date(d)
    }
}

/// Normalize a date. Unparseable input yields `None`.
pub fn normalize_date<'a>(input: impl Into<DateInput<'a>>) -> Option<NaiveDate> {
    match input.into() {
        DateInput::Date(d) => Some(d),
        DateInput::DateTime(dt) => Some(dt.date()),
        DateInput::Text(s) => parse_date(s),
    }
}

/// Normalize a date to `YYYY-MM-DD`
pub fn normalize_date_iso<'a>(input: impl Into<DateInput<'a>>) -> Option<String> {
    normalize_date(input).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Lenient free-text date parsing
///
/// ISO forms are tried first, then day-first forms (the common local
/// convention), then month-first forms for values day-first cannot read
/// (e.g. "03/25/2024").
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let datetime_formats = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
    ];
    for fmt in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    let date_formats = [
        "%Y-%m-%d", // 2024-03-15
        "%Y/%m/%d", // 2024/03/15
        "%Y%m%d",   // 20240315
        "%d/%m/%Y", // 15/03/2024
        "%d-%m-%Y", // 15-03-2024
        "%d.%m.%Y", // 15.03.2024
        "%d/%m/%y", // 15/03/24
        "%d-%m-%y", // 15-03-24
        "%m/%d/%Y", // 03/25/2024
        "%m-%d-%Y", // 03-25-2024
        "%m/%d/%y", // 03/25/24
        "%d %b %Y", // 15 Mar 2024
        "%d %B %Y", // 15 March 2024
        "%b %d, %Y", // Mar 15, 2024
        "%B %d, %Y", // March 15, 2024
    ];
    for fmt in date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }

    None
}

/// Strict `YYYY-MM-DD` check on a calendar-valid date
pub fn is_iso_date(s: &str) -> bool {
    static ISO: OnceLock<Regex> = OnceLock::new();
    let re = ISO.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"));
    re.is_match(s) && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Trim a free-text field; blank becomes `None`
pub fn clean_text(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_amount_plain() {
        assert_eq!(parse_amount("1234.56").unwrap(), 1234.56);
        assert_eq!(parse_amount("500").unwrap(), 500.0);
    }

    #[test]
    fn test_parse_amount_locale_separators() {
        assert_eq!(parse_amount("$1.234,56").unwrap(), 1234.56);
        assert_eq!(parse_amount("1,234.56").unwrap(), 1234.56);
        assert_eq!(parse_amount("1.234.567,89").unwrap(), 1234567.89);
        assert_eq!(parse_amount("1,234,567").unwrap(), 1234567.0);
        assert_eq!(parse_amount("12,50").unwrap(), 12.5);
    }

    #[test]
    fn test_parse_amount_currency_tokens() {
        assert_eq!(parse_amount("AR$ 1.500,00").unwrap(), 1500.0);
        assert_eq!(parse_amount("USD 99.90").unwrap(), 99.9);
        assert_eq!(parse_amount("€ 10,5").unwrap(), 10.5);
        assert_eq!(parse_amount("ars 250").unwrap(), 250.0);
    }

    #[test]
    fn test_parse_amount_rejects() {
        assert_eq!(
            parse_amount("0"),
            Err(Rejection::InvalidAmount("0".to_string()))
        );
        assert!(parse_amount("-5").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("").is_err());
        assert!(parse_amount("$").is_err());
        assert!(parse_amount("inf").is_err());
        assert!(parse_amount("NaN").is_err());
    }

    #[test]
    fn test_clean_amount_signed() {
        assert_eq!(clean_amount("-1.234,50"), Some(-1234.5));
        assert_eq!(clean_amount("(45.00)"), Some(-45.0));
        assert_eq!(clean_amount("+10"), Some(10.0));
        assert_eq!(clean_amount("n/a"), None);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-03-15"), Some(d(2024, 3, 15)));
        assert_eq!(parse_date("15/03/2024"), Some(d(2024, 3, 15)));
        assert_eq!(parse_date("15-03-2024"), Some(d(2024, 3, 15)));
        assert_eq!(parse_date("15.03.2024"), Some(d(2024, 3, 15)));
        assert_eq!(parse_date("03/25/2024"), Some(d(2024, 3, 25)));
        assert_eq!(parse_date("2024-03-15T10:30:00"), Some(d(2024, 3, 15)));
        assert_eq!(parse_date("2024-03-15 10:30:00"), Some(d(2024, 3, 15)));
        assert_eq!(parse_date("Mar 15, 2024"), Some(d(2024, 3, 15)));
        assert_eq!(parse_date("  2024/03/15 "), Some(d(2024, 3, 15)));
    }

    #[test]
    fn test_parse_date_ambiguous_is_day_first() {
        assert_eq!(parse_date("01/02/2024"), Some(d(2024, 2, 1)));
    }

    #[test]
    fn test_parse_date_soft_failure() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2024-13-45"), None);
    }

    #[test]
    fn test_normalize_date_inputs() {
        assert_eq!(normalize_date(d(2024, 1, 2)), Some(d(2024, 1, 2)));
        let dt = d(2024, 1, 2).and_hms_opt(23, 59, 0).unwrap();
        assert_eq!(normalize_date(DateInput::DateTime(dt)), Some(d(2024, 1, 2)));
        assert_eq!(
            normalize_date_iso("02/01/2024"),
            Some("2024-01-02".to_string())
        );
        assert_eq!(normalize_date_iso("garbage"), None);
    }

    #[test]
    fn test_is_iso_date() {
        assert!(is_iso_date("2024-03-15"));
        assert!(!is_iso_date("2024-3-15"));
        assert!(!is_iso_date("15/03/2024"));
        assert!(!is_iso_date("2024-02-30"));
        assert!(!is_iso_date("2024-03-15T00:00:00"));
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text(Some("  Edenor ")), Some("Edenor".to_string()));
        assert_eq!(clean_text(Some("   ")), None);
        assert_eq!(clean_text(None), None);
    }
}
