//! Route descriptors: one logical API operation each.
//!
//! A `RouteDescriptor` is built once by the registry and shared read-only
//! across every invocation. Nothing in here is mutated per call.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::http::HttpMethod;
use crate::schema::ParameterSchema;

/// `group.operation`, e.g. `issues.get-repo-issue`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    pub group: String,
    pub operation: String,
}

impl RouteKey {
    pub fn new(group: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            operation: operation.into(),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.operation)
    }
}

impl FromStr for RouteKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((group, operation)) if !group.is_empty() && !operation.is_empty() => {
                Ok(RouteKey::new(group, operation))
            }
            _ => Err(format!("route key `{s}` is not of the form group.operation")),
        }
    }
}

/// How payload parameters are put on the wire for body-carrying methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BodyEncoding {
    #[default]
    Json,
    /// `application/x-www-form-urlencoded` pairs.
    Form,
    /// One designated field sent verbatim.
    Raw,
    /// Binary file content supplied by the caller; payload fields go to the
    /// query string.
    MultipartFile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Token(String),
}

/// A URL path template with `:name` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    source: String,
    segments: Vec<Segment>,
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl UrlTemplate {
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            let starts_token = c == ':' && chars.peek().is_some_and(|&(_, next)| is_token_char(next));
            if !starts_token {
                literal.push(c);
                continue;
            }
            let start = i + 1;
            let mut end = start;
            while let Some(&(j, next)) = chars.peek() {
                if !is_token_char(next) {
                    break;
                }
                end = j + next.len_utf8();
                chars.next();
            }
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Token(source[start..end].to_string()));
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            source: source.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Token(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn has_token(&self, name: &str) -> bool {
        self.tokens().any(|t| t == name)
    }

    /// Substitute every token. Values are inserted as given, so callers pass
    /// already percent-encoded text. Returns the first token with no value.
    pub fn resolve<'a>(
        &self,
        lookup: impl Fn(&str) -> Option<&'a str>,
    ) -> Result<String, String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(name) => match lookup(name) {
                    Some(value) => out.push_str(value),
                    None => return Err(name.clone()),
                },
            }
        }
        Ok(out)
    }
}

/// One fully resolved, immutable route.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    pub key: RouteKey,
    pub template: UrlTemplate,
    pub method: HttpMethod,
    /// Sorted by name so query strings and bodies are stable.
    pub params: Vec<ParameterSchema>,
    /// Overrides the client's host, e.g. a separate upload host.
    pub host: Option<String>,
    pub encoding: BodyEncoding,
    /// `Some(Duration::ZERO)` disables the timeout for this route.
    pub timeout: Option<Duration>,
    /// The field sent verbatim by `BodyEncoding::Raw` routes.
    pub raw_field: Option<String>,
}

impl RouteDescriptor {
    pub fn param(&self, name: &str) -> Option<&ParameterSchema> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn path_params(&self) -> impl Iterator<Item = &ParameterSchema> {
        self.params.iter().filter(|p| p.is_path())
    }

    pub fn payload_params(&self) -> impl Iterator<Item = &ParameterSchema> {
        self.params.iter().filter(|p| !p.is_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_extracts_tokens_in_order() {
        let template = UrlTemplate::parse("/repos/:user/:repo/issues/:number");
        assert_eq!(template.tokens().collect::<Vec<_>>(), vec!["user", "repo", "number"]);
        assert!(template.has_token("repo"));
        assert!(!template.has_token("re"));
    }

    #[test]
    fn template_resolves_all_tokens() {
        let template = UrlTemplate::parse("/repos/:user/:repo/issues/:number");
        let url = template
            .resolve(|name| match name {
                "user" => Some("a"),
                "repo" => Some("b"),
                "number" => Some("7"),
                _ => None,
            })
            .unwrap();
        assert_eq!(url, "/repos/a/b/issues/7");
    }

    #[test]
    fn template_reports_unresolved_token() {
        let template = UrlTemplate::parse("/gists/:id/star");
        assert_eq!(template.resolve(|_| None).unwrap_err(), "id");
    }

    #[test]
    fn lone_colon_is_literal() {
        let template = UrlTemplate::parse("/a:/b");
        assert_eq!(template.tokens().count(), 0);
        assert_eq!(template.resolve(|_| None).unwrap(), "/a:/b");
    }

    #[test]
    fn route_key_round_trips_through_display() {
        let key: RouteKey = "issues.get-repo-issue".parse().unwrap();
        assert_eq!(key.group, "issues");
        assert_eq!(key.operation, "get-repo-issue");
        assert_eq!(key.to_string(), "issues.get-repo-issue");
        assert!("issues".parse::<RouteKey>().is_err());
        assert!(".x".parse::<RouteKey>().is_err());
    }

    #[test]
    fn body_encoding_names() {
        let enc: BodyEncoding = serde_json::from_str(r#""multipart-file""#).unwrap();
        assert_eq!(enc, BodyEncoding::MultipartFile);
        assert_eq!(BodyEncoding::default(), BodyEncoding::Json);
    }
}
