//! Request and response types shared by classification backends

use serde::{Deserialize, Serialize};

/// A document to classify
///
/// `prompt` is fully rendered (vocabulary, context line and any extracted
/// text already substituted). Backends only add the document bytes.
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub prompt: String,
    pub document: Vec<u8>,
    pub mime_type: String,
}

impl ClassificationRequest {
    pub fn new(prompt: impl Into<String>, document: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            document,
            mime_type: mime_type.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Fields a backend is asked to return
///
/// Every field is optional here; presence and validity are enforced by the
/// validator, not by deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawClassification {
    pub tipo: Option<serde_json::Value>,
    pub categoria: Option<serde_json::Value>,
    pub fecha: Option<serde_json::Value>,
    pub monto: Option<serde_json::Value>,
    pub emisor_receptor: Option<serde_json::Value>,
    pub descripcion: Option<serde_json::Value>,
    pub numero_comprobante: Option<serde_json::Value>,
}
