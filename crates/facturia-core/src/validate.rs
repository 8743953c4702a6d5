//! Classification response validation
//!
//! Turns a backend's raw text into a `TransactionRecord` or a hard rejection.
//!
//! ```text
//! RawReceived -> Parsed -> FieldsChecked -> Normalized -> Accepted
//!      |            |            |
//!      +------------+------------+--------------------> Rejected
//! ```
//!
//! Hard failures (unparseable text, missing `tipo`/`categoria`/`monto`, an
//! unknown direction, a non-positive amount) reject the response. Soft
//! failures (a category that cannot be resolved, a date that is not strict
//! `YYYY-MM-DD`) are accepted but flagged for review.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, warn};

use crate::ai::parsing::parse_classification_response;
use crate::error::Rejection;
use crate::models::{Direction, Source, TransactionRecord};
use crate::normalize::{clean_text, is_iso_date, parse_amount, parse_date, require_positive};
use crate::vocabulary::CategoryResolver;

/// Confidence for a record that needed no correction
pub const CONFIDENCE_CLEAN: f64 = 0.9;
/// Confidence for a record flagged for review
pub const CONFIDENCE_REVIEW: f64 = 0.5;

/// Outcome of validating one response
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Accepted(TransactionRecord),
    Rejected(Rejection),
}

/// Per-document inputs that are not part of the response
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub source: Source,
    pub source_file: Option<String>,
    /// Used when the response carries no usable date
    pub processing_date: NaiveDate,
}

impl ValidationContext {
    pub fn new(source: Source, processing_date: NaiveDate) -> Self {
        Self {
            source,
            source_file: None,
            processing_date,
        }
    }

    pub fn with_file(mut self, file_name: &str) -> Self {
        self.source_file = Some(file_name.to_string());
        self
    }
}

/// Validator for backend classification responses
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    resolver: CategoryResolver,
}

impl ResponseValidator {
    pub fn new(resolver: CategoryResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &CategoryResolver {
        &self.resolver
    }

    /// Validate a raw response
    pub fn validate(&self, raw: &str, ctx: &ValidationContext) -> Validation {
        match self.run(raw, ctx) {
            Ok(record) => {
                debug!(
                    category = %record.category,
                    amount = record.amount,
                    needs_review = record.needs_review,
                    "Classification accepted"
                );
                Validation::Accepted(record)
            }
            Err(rejection) => {
                warn!(
                    kind = rejection.kind(),
                    file = ctx.source_file.as_deref().unwrap_or("-"),
                    "Classification rejected: {}",
                    rejection
                );
                Validation::Rejected(rejection)
            }
        }
    }

    fn run(&self, raw: &str, ctx: &ValidationContext) -> Result<TransactionRecord, Rejection> {
        // RawReceived -> Parsed
        let fields = parse_classification_response(raw)?;

        // Parsed -> FieldsChecked
        let tipo = required_text(fields.tipo.as_ref(), "tipo")?;
        let hint = required_text(fields.categoria.as_ref(), "categoria")?;
        let monto = fields
            .monto
            .as_ref()
            .filter(|v| !is_blank(v))
            .ok_or(Rejection::MissingField("monto"))?;
        let direction: Direction = tipo
            .parse()
            .map_err(|_| Rejection::InvalidDirection(tipo.clone()))?;

        // FieldsChecked -> Normalized
        let amount = amount_from_value(monto)?;

        let mut record = TransactionRecord {
            direction,
            category: String::new(),
            amount,
            occurred_at: ctx.processing_date,
            counterparty: optional_text(fields.emisor_receptor.as_ref()),
            description: optional_text(fields.descripcion.as_ref()),
            receipt_number: optional_text(fields.numero_comprobante.as_ref()),
            source: ctx.source,
            source_file: ctx.source_file.clone(),
            ai_processed: true,
            confidence: None,
            needs_review: false,
            review_reason: None,
            manually_edited: false,
        };

        match self.resolver.resolve(&hint, direction) {
            Some(resolution) => record.category = resolution.category,
            None => {
                record.category = self
                    .resolver
                    .vocabulary()
                    .catch_all(direction)
                    .to_string();
                record.flag_review(format!("unresolved category '{}'", hint));
            }
        }

        if let Some(value) = fields.fecha.as_ref().filter(|v| !is_blank(v)) {
            // Arrays and objects are kept as their JSON text for the review reason
            let fecha = optional_text(Some(value)).unwrap_or_else(|| value.to_string());
            if is_iso_date(&fecha) {
                if let Some(date) = parse_date(&fecha) {
                    record.occurred_at = date;
                }
            } else {
                if let Some(date) = parse_date(&fecha) {
                    record.occurred_at = date;
                }
                record.flag_review(format!("malformed date '{}'", fecha));
            }
        }

        // Normalized -> Accepted
        record.confidence = Some(if record.needs_review {
            CONFIDENCE_REVIEW
        } else {
            CONFIDENCE_CLEAN
        });
        Ok(record)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Scalar value as trimmed text; blank becomes `None`
fn optional_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => clean_text(Some(s)),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn required_text(value: Option<&Value>, field: &'static str) -> Result<String, Rejection> {
    optional_text(value).ok_or(Rejection::MissingField(field))
}

fn amount_from_value(value: &Value) -> Result<f64, Rejection> {
    match value {
        Value::Number(n) => {
            let raw = n.to_string();
            let v = n.as_f64().ok_or_else(|| Rejection::InvalidAmount(raw.clone()))?;
            require_positive(v, &raw)
        }
        Value::String(s) => parse_amount(s),
        other => Err(Rejection::InvalidAmount(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn validator() -> ResponseValidator {
        ResponseValidator::new(PipelineConfig::embedded().unwrap().resolver())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn ctx() -> ValidationContext {
        ValidationContext::new(Source::Pdf, today()).with_file("factura.pdf")
    }

    fn accept(raw: &str) -> TransactionRecord {
        match validator().validate(raw, &ctx()) {
            Validation::Accepted(r) => r,
            Validation::Rejected(r) => panic!("unexpected rejection: {}", r),
        }
    }

    fn reject(raw: &str) -> Rejection {
        match validator().validate(raw, &ctx()) {
            Validation::Rejected(r) => r,
            Validation::Accepted(r) => panic!("unexpected acceptance: {:?}", r),
        }
    }

    #[test]
    fn test_clean_response() {
        let r = accept(
            r#"{"tipo": "egreso", "categoria": "supermercado", "fecha": "2024-05-20",
                "monto": 15230.5, "emisor_receptor": "Coto", "descripcion": "Compra",
                "numero_comprobante": "0001-00012345"}"#,
        );
        assert_eq!(r.direction, Direction::Expense);
        assert_eq!(r.category, "supermercado");
        assert_eq!(r.amount, 15230.5);
        assert_eq!(r.occurred_at, NaiveDate::from_ymd_opt(2024, 5, 20).unwrap());
        assert_eq!(r.counterparty.as_deref(), Some("Coto"));
        assert_eq!(r.receipt_number.as_deref(), Some("0001-00012345"));
        assert_eq!(r.source, Source::Pdf);
        assert_eq!(r.source_file.as_deref(), Some("factura.pdf"));
        assert!(r.ai_processed);
        assert!(!r.needs_review);
        assert_eq!(r.confidence, Some(CONFIDENCE_CLEAN));
    }

    #[test]
    fn test_synonym_and_containment_resolution() {
        let r = accept(r#"{"tipo": "egreso", "categoria": "factura de luz", "monto": "$1.234,56"}"#);
        assert_eq!(r.category, "factura_servicios");
        assert_eq!(r.amount, 1234.56);
        assert!(!r.needs_review);

        let r = accept(r#"{"tipo": "egreso", "categoria": "Alquiler depto", "monto": 250000}"#);
        assert_eq!(r.category, "alquiler");
        assert!(!r.needs_review);
    }

    #[test]
    fn test_shared_word_is_not_a_match() {
        let r = accept(r#"{"tipo": "egreso", "categoria": "servicios profesionales", "monto": 100}"#);
        assert_eq!(r.category, "otro_egreso");
        assert!(r.needs_review);
        assert!(r
            .review_reason
            .as_deref()
            .unwrap()
            .contains("servicios profesionales"));
        assert_eq!(r.confidence, Some(CONFIDENCE_REVIEW));
    }

    #[test]
    fn test_unresolved_category_goes_to_catch_all() {
        let r = accept(r#"{"tipo": "egreso", "categoria": "viajes", "monto": 500}"#);
        assert_eq!(r.category, "otro_egreso");
        assert!(r.needs_review);
        assert!(r.review_reason.as_deref().unwrap().contains("viajes"));
        assert_eq!(r.confidence, Some(CONFIDENCE_REVIEW));
    }

    #[test]
    fn test_malformed_date_is_soft() {
        let r = accept(r#"{"tipo": "ingreso", "categoria": "sueldo", "monto": 100, "fecha": "20/05/2024"}"#);
        assert!(r.needs_review);
        assert!(r.review_reason.as_deref().unwrap().contains("malformed date"));
        assert_eq!(r.occurred_at, NaiveDate::from_ymd_opt(2024, 5, 20).unwrap());
        assert_eq!(r.confidence, Some(CONFIDENCE_REVIEW));

        let r = accept(r#"{"tipo": "ingreso", "categoria": "sueldo", "monto": 100, "fecha": "ayer"}"#);
        assert!(r.needs_review);
        assert_eq!(r.occurred_at, today());
    }

    #[test]
    fn test_non_text_date_is_flagged() {
        let r = accept(r#"{"tipo": "ingreso", "categoria": "sueldo", "monto": 100, "fecha": ["2024-05-01"]}"#);
        assert_eq!(r.occurred_at, today());
        assert!(r.needs_review);
        assert!(r.review_reason.as_deref().unwrap().contains("malformed date"));

        let r = accept(r#"{"tipo": "ingreso", "categoria": "sueldo", "monto": 100, "fecha": {"dia": 1}}"#);
        assert!(r.needs_review);

        let r = accept(r#"{"tipo": "ingreso", "categoria": "sueldo", "monto": 100, "fecha": 20240501}"#);
        assert!(r.needs_review);
    }

    #[test]
    fn test_missing_date_defaults_without_review() {
        let r = accept(r#"{"tipo": "ingreso", "categoria": "sueldo", "monto": 100, "fecha": null}"#);
        assert_eq!(r.occurred_at, today());
        assert!(!r.needs_review);

        let r = accept(r#"{"tipo": "ingreso", "categoria": "sueldo", "monto": 100, "fecha": "  "}"#);
        assert_eq!(r.occurred_at, today());
        assert!(!r.needs_review);

        let r = accept(r#"{"tipo": "ingreso", "categoria": "sueldo", "monto": 100}"#);
        assert!(!r.needs_review);
    }

    #[test]
    fn test_both_soft_failures_accumulate() {
        let r = accept(r#"{"tipo": "egreso", "categoria": "viajes", "monto": 1, "fecha": "mayo"}"#);
        let reason = r.review_reason.unwrap();
        assert!(reason.contains("viajes"));
        assert!(reason.contains("mayo"));
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            reject(r#"{"tipo": "egreso", "categoria": "salud"}"#),
            Rejection::MissingField("monto")
        );
        assert_eq!(
            reject(r#"{"tipo": "egreso", "categoria": "salud", "monto": null}"#),
            Rejection::MissingField("monto")
        );
        assert_eq!(
            reject(r#"{"categoria": "salud", "monto": 5}"#),
            Rejection::MissingField("tipo")
        );
        assert_eq!(
            reject(r#"{"tipo": "egreso", "categoria": "  ", "monto": 5}"#),
            Rejection::MissingField("categoria")
        );
    }

    #[test]
    fn test_invalid_direction() {
        assert_eq!(
            reject(r#"{"tipo": "transferencia", "categoria": "salud", "monto": 5}"#),
            Rejection::InvalidDirection("transferencia".into())
        );
    }

    #[test]
    fn test_invalid_amounts() {
        assert!(matches!(
            reject(r#"{"tipo": "egreso", "categoria": "salud", "monto": 0}"#),
            Rejection::InvalidAmount(_)
        ));
        assert!(matches!(
            reject(r#"{"tipo": "egreso", "categoria": "salud", "monto": -5}"#),
            Rejection::InvalidAmount(_)
        ));
        assert!(matches!(
            reject(r#"{"tipo": "egreso", "categoria": "salud", "monto": "abc"}"#),
            Rejection::InvalidAmount(_)
        ));
        assert!(matches!(
            reject(r#"{"tipo": "egreso", "categoria": "salud", "monto": [1]}"#),
            Rejection::InvalidAmount(_)
        ));
    }

    #[test]
    fn test_parse_failure() {
        assert!(matches!(
            reject("No encontré datos financieros."),
            Rejection::ParseFailure(_)
        ));
    }

    #[test]
    fn test_fenced_python_style_response() {
        let r = accept("```json\n{'tipo': 'egreso', 'categoria': 'Netflix', 'monto': '2.999,00', 'fecha': None}\n```");
        assert_eq!(r.category, "entretenimiento");
        assert_eq!(r.amount, 2999.0);
    }

    #[test]
    fn test_numeric_receipt_number() {
        let r = accept(r#"{"tipo": "egreso", "categoria": "salud", "monto": 5, "numero_comprobante": 12345}"#);
        assert_eq!(r.receipt_number.as_deref(), Some("12345"));
    }

    #[test]
    fn test_idempotent() {
        let raw = r#"{"tipo": "egreso", "categoria": "viajes", "monto": 500}"#;
        let v = validator();
        assert_eq!(v.validate(raw, &ctx()), v.validate(raw, &ctx()));
    }
}
