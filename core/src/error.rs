//! Error types for the dispatch engine.
//!
//! # Design
//! Local, pre-flight failures (`Validation`, `UnknownRoute`, `Build`) never
//! reach the transport. `Transport` means no response was received at all and
//! is never conflated with a status the server returned. Every
//! response-derived kind wraps a `RemoteFailure` so status, headers and body
//! stay inspectable. `NotFound` gets a dedicated variant because callers
//! frequently treat a missing resource as an expected case.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::pagination::Pagination;
use crate::response::{Payload, ResponseMeta};
use crate::transport::TransportError;

/// Every failure an invocation can end in. Exactly one is delivered per call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// 401 or 403.
    #[error("authentication failed: {0}")]
    Auth(RemoteFailure),

    /// 404.
    #[error("resource not found: {0}")]
    NotFound(RemoteFailure),

    /// 422 with the field-level problems reported by the server.
    #[error("remote validation failed: {failure}")]
    RemoteValidation {
        failure: RemoteFailure,
        errors: Vec<FieldError>,
    },

    /// Any other non-success status.
    #[error("remote error: {0}")]
    Remote(RemoteFailure),

    /// A success response claimed JSON but the body did not decode. The
    /// response is kept with its body decoded leniently.
    #[error("response decoding failed: {error}")]
    Decode {
        error: String,
        failure: RemoteFailure,
    },

    #[error("unknown route `{0}`")]
    UnknownRoute(String),

    /// A URL template token survived substitution. Indicates a registry bug,
    /// not bad caller input.
    #[error("request build failed: {0}")]
    Build(String),
}

impl ApiError {
    /// HTTP status for the kinds built from a received response.
    pub fn status(&self) -> Option<u16> {
        self.failure().map(|f| f.status)
    }

    pub fn failure(&self) -> Option<&RemoteFailure> {
        match self {
            ApiError::Auth(f) | ApiError::NotFound(f) | ApiError::Remote(f) => Some(f),
            ApiError::RemoteValidation { failure, .. } | ApiError::Decode { failure, .. } => {
                Some(failure)
            }
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

/// Why a parameter failed local binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    Missing,
    Invalid(String),
}

/// Raised by the parameter binder. Always names the offending field and
/// carries the route's configured invalid-message (possibly empty).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{}", describe(.field, .problem), suffix(.message))]
pub struct ValidationError {
    pub field: String,
    pub problem: Problem,
    pub message: String,
}

impl ValidationError {
    pub fn missing(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: Problem::Missing,
            message: message.into(),
        }
    }

    pub fn invalid(
        field: impl Into<String>,
        detail: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            problem: Problem::Invalid(detail.into()),
            message: message.into(),
        }
    }

    pub fn is_missing(&self) -> bool {
        self.problem == Problem::Missing
    }
}

fn describe(field: &str, problem: &Problem) -> String {
    match problem {
        Problem::Missing => format!("missing required parameter `{field}`"),
        Problem::Invalid(detail) => format!("invalid value for parameter `{field}`: {detail}"),
    }
}

fn suffix(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(" ({message})")
    }
}

/// Everything the server sent back with a response that did not succeed.
#[derive(Debug, Clone)]
pub struct RemoteFailure {
    pub status: u16,
    /// The `message` member of a JSON error body, when present.
    pub message: Option<String>,
    pub headers: Vec<(String, String)>,
    pub meta: ResponseMeta,
    pub body: Payload,
    /// `Link` relations, which GitHub also sends on some error pages.
    pub pagination: Pagination,
}

impl std::fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        } else if let Payload::Text(text) = &self.body {
            write!(f, ": {text}")?;
        }
        Ok(())
    }
}

/// One entry of the `errors` array in a 422 body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl FieldError {
    /// Entries are usually objects, but plain strings occur too.
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(FieldError {
                message: Some(s.clone()),
                ..FieldError::default()
            }),
            Value::Object(_) => serde_json::from_value(value.clone()).ok(),
            _ => None,
        }
    }
}
