//! Decoded responses and the header-derived state that rides on them.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ApiError, RemoteFailure};
use crate::http::find_header;
use crate::pagination::Pagination;

/// A response body after content-type driven decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
    Empty,
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }
}

/// Server-reported request quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    /// Seconds since the Unix epoch at which the window resets.
    pub reset: u64,
}

impl RateLimit {
    /// Fold any `X-RateLimit-*` headers into `previous`. Returns `None` when
    /// the response carries none of them.
    pub fn refresh(previous: Option<RateLimit>, headers: &[(String, String)]) -> Option<RateLimit> {
        let read = |name: &str| find_header(headers, name).and_then(|v| v.trim().parse::<u64>().ok());
        let limit = read("X-RateLimit-Limit");
        let remaining = read("X-RateLimit-Remaining");
        let reset = read("X-RateLimit-Reset");
        if limit.is_none() && remaining.is_none() && reset.is_none() {
            return None;
        }

        let mut next = previous.unwrap_or_default();
        if let Some(limit) = limit {
            next.limit = limit;
        }
        if let Some(remaining) = remaining {
            next.remaining = remaining;
        }
        if let Some(reset) = reset {
            next.reset = reset;
        }
        Some(next)
    }
}

/// The recognized response headers, verbatim and in received case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    headers: Vec<(String, String)>,
}

impl ResponseMeta {
    pub(crate) fn collect(headers: &[(String, String)], recognized: &[String]) -> Self {
        let headers = headers
            .iter()
            .filter(|(name, _)| recognized.iter().any(|r| r.eq_ignore_ascii_case(name)))
            .cloned()
            .collect();
        Self { headers }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn etag(&self) -> Option<&str> {
        self.get("ETag")
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.get("Last-Modified")
    }

    pub fn location(&self) -> Option<&str> {
        self.get("Location")
    }

    pub fn oauth_scopes(&self) -> Vec<&str> {
        self.get("X-OAuth-Scopes")
            .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    pub fn rate_limit(&self) -> Option<RateLimit> {
        RateLimit::refresh(None, &self.headers)
    }
}

/// A successful, decoded response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub status: u16,
    /// Every header as received.
    pub headers: Vec<(String, String)>,
    pub meta: ResponseMeta,
    pub body: Payload,
    pub pagination: Pagination,
}

impl ResponseEnvelope {
    /// Deserialize a JSON payload into a caller type. An empty body reads as
    /// JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let value = match &self.body {
            Payload::Json(value) => value.clone(),
            Payload::Empty => Value::Null,
            Payload::Text(_) | Payload::Bytes(_) => {
                return Err(self.decode_error("response body is not JSON".to_string()))
            }
        };
        serde_json::from_value(value).map_err(|e| self.decode_error(e.to_string()))
    }

    fn decode_error(&self, error: String) -> ApiError {
        ApiError::Decode {
            error,
            failure: RemoteFailure {
                status: self.status,
                message: None,
                headers: self.headers.clone(),
                meta: self.meta.clone(),
                body: self.body.clone(),
                pagination: self.pagination.clone(),
            },
        }
    }

    /// `304 Not Modified` answer to a conditional request.
    pub fn not_modified(&self) -> bool {
        self.status == 304
    }
}
