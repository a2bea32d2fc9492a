//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The engine
//! builds `HttpRequest` values and interprets `HttpResponse` values without
//! touching the network; a `Transport` (or the host itself) executes the
//! actual I/O. This keeps binding and interpretation deterministic and easy
//! to test.
//!
//! Bodies are raw bytes because multipart-file routes upload binary content.
//! Header names are compared case-insensitively everywhere.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP method for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether payload parameters travel in the query string rather than a
    /// request body.
    pub fn sends_query(&self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unsupported HTTP method `{other}`")),
        }
    }
}

/// A fully bound request described as plain data.
///
/// Produced by `Client::prepare`. Owned by the in-flight call and discarded
/// once the response has been interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    /// `None` means the transport's own default (or no timeout at all).
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The body as UTF-8 text, if there is one and it is valid UTF-8.
    pub fn body_text(&self) -> Option<&str> {
        self.body.as_deref().and_then(|b| std::str::from_utf8(b).ok())
    }
}

/// A raw response as handed back by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Every header as received, names in their original case.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Ordered header collection where a later insert replaces an earlier one
/// with the same (case-insensitive) name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct HeaderSet(Vec<(String, String)>);

impl HeaderSet {
    pub(crate) fn insert(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub(crate) fn into_vec(self) -> Vec<(String, String)> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("patch".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert_eq!("GET".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn only_get_and_delete_send_query() {
        assert!(HttpMethod::Get.sends_query());
        assert!(HttpMethod::Delete.sends_query());
        assert!(!HttpMethod::Post.sends_query());
        assert!(!HttpMethod::Patch.sends_query());
    }

    #[test]
    fn response_header_lookup_ignores_case() {
        let response = HttpResponse::new(200).with_header("X-RateLimit-Limit", "60");
        assert_eq!(response.header("x-ratelimit-limit"), Some("60"));
        assert_eq!(response.header("etag"), None);
    }

    #[test]
    fn header_set_later_insert_wins() {
        let mut headers = HeaderSet::default();
        headers.insert("Accept", "application/json");
        headers.insert("user-agent", "a");
        headers.insert("ACCEPT", "text/html");
        assert_eq!(
            headers.into_vec(),
            vec![
                ("accept".to_string(), "text/html".to_string()),
                ("user-agent".to_string(), "a".to_string()),
            ]
        );
    }
}
