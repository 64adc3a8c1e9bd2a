//! Value shapes the artifact store accepts on write.

use serde_json::Value;

/// What a caller hands to `ArtifactStore::put`. Strings become UTF-8 bytes,
/// JSON values are serialized canonically, raw bytes pass through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    Text(String),
    Json(Value),
    Bytes(Vec<u8>),
}

impl StoreValue {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            StoreValue::Text(s) => s.into_bytes(),
            StoreValue::Json(v) => serde_json::to_vec(&v).unwrap_or_default(),
            StoreValue::Bytes(b) => b,
        }
    }

    pub fn default_content_type(&self) -> &'static str {
        match self {
            StoreValue::Text(_) => "text/plain",
            StoreValue::Json(_) => "application/json",
            StoreValue::Bytes(_) => "application/octet-stream",
        }
    }
}

impl From<String> for StoreValue {
    fn from(s: String) -> Self {
        StoreValue::Text(s)
    }
}

impl From<&str> for StoreValue {
    fn from(s: &str) -> Self {
        StoreValue::Text(s.to_string())
    }
}

impl From<Value> for StoreValue {
    fn from(v: Value) -> Self {
        StoreValue::Json(v)
    }
}

impl From<Vec<u8>> for StoreValue {
    fn from(b: Vec<u8>) -> Self {
        StoreValue::Bytes(b)
    }
}
