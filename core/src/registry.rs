//! Immutable route registry built once from route-table configuration.
//!
//! # Design
//! - Every `$name` reference is expanded against the shared parameter
//!   dictionary here, at load time, never at call time.
//! - Validation returns all problems found, not just the first, so a broken
//!   route table can be fixed in one pass.
//! - Routes that share a URL and method are independent keys; nothing is
//!   merged.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::http::HttpMethod;
use crate::route::{BodyEncoding, RouteDescriptor, RouteKey, UrlTemplate};
use crate::schema::{ParamDef, ParamKind, ParamLocation, ParamSpec, ParameterSchema};

/// Response headers surfaced to callers when a table declares none.
pub const DEFAULT_RESPONSE_HEADERS: &[&str] = &[
    "X-RateLimit-Limit",
    "X-RateLimit-Remaining",
    "X-RateLimit-Reset",
    "X-Oauth-Scopes",
    "Link",
    "Location",
    "Last-Modified",
    "Etag",
    "Status",
];

/// Request headers accepted from callers when a table declares none.
pub const DEFAULT_REQUEST_HEADERS: &[&str] = &[
    "If-Modified-Since",
    "If-None-Match",
    "Cookie",
    "User-Agent",
    "Accept",
    "X-GitHub-OTP",
];

fn default_protocol() -> String {
    "https".to_string()
}

fn default_media() -> String {
    "application/json".to_string()
}

/// API-wide constants from the `defines.constants` block.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConstants {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub path_prefix: String,
    #[serde(default)]
    pub date_format: String,
    /// Encoding for routes that do not name one.
    #[serde(default)]
    pub request_format: BodyEncoding,
    /// Default `Accept` media type.
    #[serde(default = "default_media")]
    pub request_media: String,
}

impl ApiConstants {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            protocol: default_protocol(),
            host: host.into(),
            port: None,
            path_prefix: String::new(),
            date_format: String::new(),
            request_format: BodyEncoding::Json,
            request_media: default_media(),
        }
    }
}

/// One route as written in a route table.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDef {
    pub url: String,
    pub method: String,
    /// `"$name": null` entries reference the shared dictionary.
    #[serde(default)]
    pub params: BTreeMap<String, Option<ParamDef>>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub request_format: Option<BodyEncoding>,
    #[serde(default)]
    pub body_encoding: Option<BodyEncoding>,
    #[serde(default)]
    pub has_file_body: bool,
    /// Milliseconds; `0` disables the timeout.
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl RouteDef {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.as_str().to_string(),
            params: BTreeMap::new(),
            host: None,
            request_format: None,
            body_encoding: None,
            has_file_body: false,
            timeout: None,
        }
    }

    pub fn with_param(mut self, spec: ParamSpec) -> Self {
        match spec {
            ParamSpec::Shorthand(name) => self.params.insert(format!("${name}"), None),
            ParamSpec::Full(name, def) => self.params.insert(name, Some(def)),
        };
        self
    }

    pub fn shared(self, name: &str) -> Self {
        self.with_param(ParamSpec::Shorthand(name.to_string()))
    }

    pub fn param(self, name: &str, def: ParamDef) -> Self {
        self.with_param(ParamSpec::Full(name.to_string(), def))
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn encoding(mut self, encoding: BodyEncoding) -> Self {
        self.body_encoding = Some(encoding);
        self
    }

    pub fn timeout_ms(mut self, millis: u64) -> Self {
        self.timeout = Some(millis);
        self
    }

    fn specs(&self, key: &RouteKey, issues: &mut Vec<ConfigIssue>) -> Vec<ParamSpec> {
        let mut specs = Vec::with_capacity(self.params.len());
        for (raw, def) in &self.params {
            match (raw.strip_prefix('$'), def) {
                (Some(name), None) => specs.push(ParamSpec::Shorthand(name.to_string())),
                (Some(name), Some(_)) => issues.push(ConfigIssue::InlineShorthand {
                    route: key.to_string(),
                    name: name.to_string(),
                }),
                (None, Some(def)) => specs.push(ParamSpec::Full(raw.clone(), def.clone())),
                (None, None) => issues.push(ConfigIssue::MissingDefinition {
                    route: key.to_string(),
                    name: raw.clone(),
                }),
            }
        }
        specs
    }

    fn resolve_encoding(&self, fallback: BodyEncoding) -> BodyEncoding {
        self.body_encoding
            .or(self.has_file_body.then_some(BodyEncoding::MultipartFile))
            .or(self.request_format)
            .unwrap_or(fallback)
    }
}

/// A single consistency problem in a route table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    #[error("{route}: unsupported method `{method}`")]
    UnknownMethod { route: String, method: String },

    #[error("{route}: `${name}` does not match any shared parameter")]
    UnresolvedReference { route: String, name: String },

    #[error("{route}: `${name}` is a reference and cannot carry a definition")]
    InlineShorthand { route: String, name: String },

    #[error("{route}: parameter `{name}` has no definition")]
    MissingDefinition { route: String, name: String },

    #[error("{route}: parameter `{name}` is declared twice")]
    DuplicateParam { route: String, name: String },

    #[error("{route}: URL token `:{token}` has no parameter schema")]
    UnboundToken { route: String, token: String },

    #[error("{route}: parameter `{name}` has an invalid pattern: {error}")]
    InvalidPattern {
        route: String,
        name: String,
        error: String,
    },

    #[error("{route}: raw body route has no `data` or Raw parameter")]
    MissingRawField { route: String },

    #[error("{route}: route is defined twice")]
    DuplicateRoute { route: String },
}

fn summarize(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("route table is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("route table has {} problem(s): {}", .0.len(), summarize(.0))]
    Invalid(Vec<ConfigIssue>),
}

impl ConfigError {
    pub fn issues(&self) -> &[ConfigIssue] {
        match self {
            ConfigError::Invalid(issues) => issues,
            ConfigError::Parse(_) => &[],
        }
    }
}

#[derive(Deserialize)]
struct Defines {
    constants: ApiConstants,
    #[serde(default, rename = "response-headers")]
    response_headers: Vec<String>,
    #[serde(default, rename = "request-headers")]
    request_headers: Vec<String>,
    #[serde(default)]
    params: BTreeMap<String, ParamDef>,
}

#[derive(Deserialize)]
struct RouteTable {
    defines: Defines,
    #[serde(flatten)]
    groups: BTreeMap<String, BTreeMap<String, RouteDef>>,
}

/// The validated, read-only route table.
#[derive(Debug, Clone)]
pub struct Registry {
    constants: ApiConstants,
    response_headers: Vec<String>,
    request_headers: Vec<String>,
    routes: BTreeMap<RouteKey, RouteDescriptor>,
}

impl Registry {
    /// Parse and validate a route table document.
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        let table: RouteTable = serde_json::from_str(source)?;
        let mut builder = Registry::builder(table.defines.constants)
            .response_headers(table.defines.response_headers)
            .request_headers(table.defines.request_headers);
        for (name, def) in table.defines.params {
            builder = builder.shared_param(&name, def);
        }
        for (group, operations) in table.groups {
            for (operation, def) in operations {
                builder = builder.route(RouteKey::new(group.clone(), operation), def);
            }
        }
        builder.build()
    }

    pub fn builder(constants: ApiConstants) -> RegistryBuilder {
        RegistryBuilder {
            constants,
            response_headers: Vec::new(),
            request_headers: Vec::new(),
            shared: BTreeMap::new(),
            routes: Vec::new(),
        }
    }

    pub fn constants(&self) -> &ApiConstants {
        &self.constants
    }

    pub fn response_headers(&self) -> &[String] {
        &self.response_headers
    }

    pub fn request_headers(&self) -> &[String] {
        &self.request_headers
    }

    pub fn route(&self, key: &RouteKey) -> Option<&RouteDescriptor> {
        self.routes.get(key)
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteDescriptor> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Collects constants, shared parameters and routes, then validates them as
/// a whole in `build`.
#[derive(Debug, Clone)]
pub struct RegistryBuilder {
    constants: ApiConstants,
    response_headers: Vec<String>,
    request_headers: Vec<String>,
    shared: BTreeMap<String, ParamDef>,
    routes: Vec<(RouteKey, RouteDef)>,
}

impl RegistryBuilder {
    pub fn response_headers(mut self, headers: Vec<String>) -> Self {
        self.response_headers = headers;
        self
    }

    pub fn request_headers(mut self, headers: Vec<String>) -> Self {
        self.request_headers = headers;
        self
    }

    pub fn shared_param(mut self, name: &str, def: ParamDef) -> Self {
        self.shared.insert(name.to_string(), def);
        self
    }

    pub fn route(mut self, key: RouteKey, def: RouteDef) -> Self {
        self.routes.push((key, def));
        self
    }

    pub fn build(self) -> Result<Registry, ConfigError> {
        let mut issues = Vec::new();
        let mut routes = BTreeMap::new();
        let mut seen = BTreeSet::new();

        for (key, def) in &self.routes {
            if !seen.insert(key) {
                issues.push(ConfigIssue::DuplicateRoute {
                    route: key.to_string(),
                });
                continue;
            }
            if let Some(route) = self.resolve(key, def, &mut issues) {
                routes.insert(key.clone(), route);
            }
        }

        if !issues.is_empty() {
            return Err(ConfigError::Invalid(issues));
        }
        debug!(routes = routes.len(), "route registry loaded");

        Ok(Registry {
            constants: self.constants,
            response_headers: or_defaults(self.response_headers, DEFAULT_RESPONSE_HEADERS),
            request_headers: or_defaults(self.request_headers, DEFAULT_REQUEST_HEADERS),
            routes,
        })
    }

    fn resolve(
        &self,
        key: &RouteKey,
        def: &RouteDef,
        issues: &mut Vec<ConfigIssue>,
    ) -> Option<RouteDescriptor> {
        let before = issues.len();
        let method = def.method.parse::<HttpMethod>();
        if method.is_err() {
            issues.push(ConfigIssue::UnknownMethod {
                route: key.to_string(),
                method: def.method.clone(),
            });
        }
        let template = UrlTemplate::parse(&def.url);

        let mut params: Vec<ParameterSchema> = Vec::new();
        for spec in def.specs(key, issues) {
            let name = spec.name().to_string();
            let param_def = match &spec {
                ParamSpec::Full(_, d) => d,
                ParamSpec::Shorthand(_) => match self.shared.get(&name) {
                    Some(d) => d,
                    None => {
                        issues.push(ConfigIssue::UnresolvedReference {
                            route: key.to_string(),
                            name,
                        });
                        continue;
                    }
                },
            };
            if params.iter().any(|p| p.name == name) {
                issues.push(ConfigIssue::DuplicateParam {
                    route: key.to_string(),
                    name,
                });
                continue;
            }
            let location = if template.has_token(&name) {
                ParamLocation::Path
            } else {
                ParamLocation::Payload
            };
            match ParameterSchema::resolve(&name, param_def, location) {
                Ok(schema) => params.push(schema),
                Err(err) => issues.push(ConfigIssue::InvalidPattern {
                    route: key.to_string(),
                    name,
                    error: err.to_string(),
                }),
            }
        }
        params.sort_by(|a, b| a.name.cmp(&b.name));

        for token in template.tokens() {
            if !params.iter().any(|p| p.name == token) {
                issues.push(ConfigIssue::UnboundToken {
                    route: key.to_string(),
                    token: token.to_string(),
                });
            }
        }

        let encoding = def.resolve_encoding(self.constants.request_format);
        let raw_field = match encoding {
            BodyEncoding::Raw => {
                let field = params
                    .iter()
                    .find(|p| p.kind == ParamKind::Raw)
                    .or_else(|| params.iter().find(|p| p.name == "data"))
                    .map(|p| p.name.clone());
                if field.is_none() {
                    issues.push(ConfigIssue::MissingRawField {
                        route: key.to_string(),
                    });
                }
                field
            }
            _ => None,
        };

        if issues.len() > before {
            return None;
        }
        Some(RouteDescriptor {
            key: key.clone(),
            template,
            method: method.ok()?,
            params,
            host: def.host.clone(),
            encoding,
            timeout: def.timeout.map(Duration::from_millis),
            raw_field,
        })
    }
}

fn or_defaults(headers: Vec<String>, defaults: &[&str]) -> Vec<String> {
    if headers.is_empty() {
        defaults.iter().map(|h| h.to_string()).collect()
    } else {
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"{
        "defines": {
            "constants": { "host": "api.example.com", "requestMedia": "application/vnd.example+json" },
            "params": {
                "user": { "type": "String", "required": true },
                "repo": { "type": "String", "required": true },
                "number": { "type": "Number", "required": true, "validation": "^[0-9]+$" },
                "page": { "type": "Number", "required": false, "validation": "^[0-9]+$" },
                "data": { "type": "String", "required": true }
            }
        },
        "issues": {
            "get-repo-issue": {
                "url": "/repos/:user/:repo/issues/:number",
                "method": "GET",
                "params": { "$user": null, "$repo": null, "$number": null }
            },
            "repo-issues": {
                "url": "/repos/:user/:repo/issues",
                "method": "GET",
                "params": {
                    "$user": null, "$repo": null, "$page": null,
                    "state": { "type": "String", "validation": "^(open|closed)$", "invalidmsg": "open, closed" }
                }
            }
        },
        "markdown": {
            "render-raw": {
                "url": "/markdown/raw",
                "method": "POST",
                "requestFormat": "raw",
                "params": { "$data": null }
            }
        },
        "repos": {
            "upload-asset": {
                "url": "/repos/:user/:repo/releases/:id/assets",
                "method": "POST",
                "host": "uploads.example.com",
                "hasFileBody": true,
                "timeout": 0,
                "params": {
                    "$user": null, "$repo": null,
                    "id": { "type": "Number", "required": true },
                    "name": { "type": "String", "required": true }
                }
            }
        }
    }"#;

    #[test]
    fn loads_and_expands_shorthand_parameters() {
        let registry = Registry::from_json(TABLE).unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.constants().protocol, "https");
        assert_eq!(registry.constants().request_media, "application/vnd.example+json");

        let route = registry
            .route(&RouteKey::new("issues", "get-repo-issue"))
            .unwrap();
        assert_eq!(route.method, HttpMethod::Get);
        let number = route.param("number").unwrap();
        assert_eq!(number.kind, ParamKind::Number);
        assert!(number.is_path());
        assert!(number.pattern.is_some());
    }

    #[test]
    fn payload_parameters_keep_their_required_flag() {
        let registry = Registry::from_json(TABLE).unwrap();
        let route = registry.route(&RouteKey::new("issues", "repo-issues")).unwrap();
        let names: Vec<_> = route.payload_params().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["page", "state"]);
        assert!(!route.param("state").unwrap().required);
        assert_eq!(route.param("state").unwrap().invalid_message, "open, closed");
    }

    #[test]
    fn route_overrides_are_resolved() {
        let registry = Registry::from_json(TABLE).unwrap();
        let raw = registry.route(&RouteKey::new("markdown", "render-raw")).unwrap();
        assert_eq!(raw.encoding, BodyEncoding::Raw);
        assert_eq!(raw.raw_field.as_deref(), Some("data"));

        let upload = registry.route(&RouteKey::new("repos", "upload-asset")).unwrap();
        assert_eq!(upload.encoding, BodyEncoding::MultipartFile);
        assert_eq!(upload.host.as_deref(), Some("uploads.example.com"));
        assert_eq!(upload.timeout, Some(Duration::ZERO));
    }

    #[test]
    fn default_header_lists_apply_when_table_has_none() {
        let registry = Registry::from_json(TABLE).unwrap();
        assert!(registry.response_headers().iter().any(|h| h == "Link"));
        assert!(registry.request_headers().iter().any(|h| h == "If-None-Match"));
    }

    #[test]
    fn all_problems_are_reported_together() {
        let result = Registry::builder(ApiConstants::new("api.example.com"))
            .shared_param("user", ParamDef::new(ParamKind::String).required())
            .route(
                RouteKey::new("a", "missing-ref"),
                RouteDef::new(HttpMethod::Get, "/users/:user/:repo").shared("user").shared("nope"),
            )
            .route(
                RouteKey::new("a", "bad-pattern"),
                RouteDef::new(HttpMethod::Get, "/x")
                    .param("state", ParamDef::new(ParamKind::String).pattern("(")),
            )
            .route(
                RouteKey::new("a", "raw"),
                RouteDef::new(HttpMethod::Post, "/raw").encoding(BodyEncoding::Raw),
            )
            .build();

        let err = result.unwrap_err();
        let issues = err.issues();
        assert!(issues.contains(&ConfigIssue::UnresolvedReference {
            route: "a.missing-ref".into(),
            name: "nope".into(),
        }));
        assert!(issues.contains(&ConfigIssue::UnboundToken {
            route: "a.missing-ref".into(),
            token: "repo".into(),
        }));
        assert!(issues
            .iter()
            .any(|i| matches!(i, ConfigIssue::InvalidPattern { name, .. } if name == "state")));
        assert!(issues.contains(&ConfigIssue::MissingRawField { route: "a.raw".into() }));
        assert!(err.to_string().starts_with("route table has 4 problem(s)"));
    }

    #[test]
    fn unknown_method_and_malformed_entries_are_rejected() {
        let table = r#"{
            "defines": { "constants": { "host": "h" }, "params": { "id": { "type": "String" } } },
            "g": {
                "op": { "url": "/x", "method": "TRACE" },
                "inline": { "url": "/y", "method": "GET", "params": { "$id": { "type": "String" } } },
                "null": { "url": "/z", "method": "GET", "params": { "id": null } }
            }
        }"#;
        let issues = Registry::from_json(table).unwrap_err().issues().to_vec();
        assert_eq!(issues.len(), 3);
        assert!(issues.contains(&ConfigIssue::UnknownMethod {
            route: "g.op".into(),
            method: "TRACE".into(),
        }));
        assert!(issues.contains(&ConfigIssue::InlineShorthand {
            route: "g.inline".into(),
            name: "id".into(),
        }));
        assert!(issues.contains(&ConfigIssue::MissingDefinition {
            route: "g.null".into(),
            name: "id".into(),
        }));
    }

    #[test]
    fn duplicate_keys_and_parameters_are_rejected() {
        let route = RouteDef::new(HttpMethod::Get, "/x")
            .shared("id")
            .param("id", ParamDef::new(ParamKind::String));
        let err = Registry::builder(ApiConstants::new("h"))
            .shared_param("id", ParamDef::new(ParamKind::String))
            .route(RouteKey::new("g", "op"), route)
            .route(RouteKey::new("g", "op"), RouteDef::new(HttpMethod::Get, "/x"))
            .build()
            .unwrap_err();
        assert!(err.issues().contains(&ConfigIssue::DuplicateParam {
            route: "g.op".into(),
            name: "id".into(),
        }));
        assert!(err.issues().contains(&ConfigIssue::DuplicateRoute { route: "g.op".into() }));
    }

    #[test]
    fn same_url_and_method_under_two_keys_stay_independent() {
        let registry = Registry::builder(ApiConstants::new("h"))
            .route(
                RouteKey::new("g", "a"),
                RouteDef::new(HttpMethod::Get, "/same").param("x", ParamDef::new(ParamKind::String)),
            )
            .route(
                RouteKey::new("g", "b"),
                RouteDef::new(HttpMethod::Get, "/same").param("y", ParamDef::new(ParamKind::Number)),
            )
            .build()
            .unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.route(&RouteKey::new("g", "a")).unwrap().param("y").is_none());
        assert!(registry.route(&RouteKey::new("g", "b")).unwrap().param("x").is_none());
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        assert!(matches!(Registry::from_json("{"), Err(ConfigError::Parse(_))));
    }
}
