//! The caller-supplied argument bag for one invocation.
//!
//! Named values are plain JSON. Per-call request headers and the binary body
//! of upload routes ride alongside because neither fits in a JSON object.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Map<String, Value>,
    headers: Vec<(String, String)>,
    file: Option<Vec<u8>>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object. Returns `None` for any other JSON value.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(values) => Some(Self::from(values)),
            _ => None,
        }
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Attach a request header. Only names in the registry's recognized
    /// request-header set are forwarded.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Binary content for multipart-file routes.
    pub fn file(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.file = Some(content.into());
        self
    }

    /// A value counts as present unless it is missing or JSON `null`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn file_body(&self) -> Option<&[u8]> {
        self.file.as_deref()
    }
}

impl From<Map<String, Value>> for Arguments {
    fn from(values: Map<String, Value>) -> Self {
        Self {
            values,
            headers: Vec::new(),
            file: None,
        }
    }
}
