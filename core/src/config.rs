//! Client-wide configuration and credentials.
//!
//! # Design
//! `ClientConfig` starts from the registry's API constants and is then
//! narrowed by the embedding application, either through `with_*` methods or
//! by applying a serde-deserialized `ConfigOverrides`. The engine reads no
//! files and no environment variables on its own.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use url::Url;

use crate::registry::ApiConstants;

pub fn default_user_agent() -> String {
    format!("restroute/{}", env!("CARGO_PKG_VERSION"))
}

/// Credentials applied to every request.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Auth {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    /// `authorization: token <token>`
    Token { token: String },
    /// `access_token` query parameter.
    OAuth { token: String },
    /// Application credentials as `client_id` and `client_secret` query
    /// parameters.
    Client { id: String, secret: String },
}

impl Auth {
    pub(crate) fn header(&self) -> Option<String> {
        match self {
            Auth::Basic { username, password } => Some(format!(
                "Basic {}",
                STANDARD.encode(format!("{username}:{password}"))
            )),
            Auth::Token { token } => Some(format!("token {token}")),
            _ => None,
        }
    }

    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        match self {
            Auth::OAuth { token } => vec![("access_token", token.as_str())],
            Auth::Client { id, secret } => {
                vec![("client_id", id.as_str()), ("client_secret", secret.as_str())]
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::None => f.write_str("None"),
            Auth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Auth::Token { .. } => f.debug_struct("Token").field("token", &"<redacted>").finish(),
            Auth::OAuth { .. } => f.debug_struct("OAuth").field("token", &"<redacted>").finish(),
            Auth::Client { id, .. } => f
                .debug_struct("Client")
                .field("id", id)
                .field("secret", &"<redacted>")
                .finish(),
        }
    }
}

/// Everything the request builder needs beyond the route itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub protocol: String,
    pub host: String,
    pub port: Option<u16>,
    pub path_prefix: String,
    /// Applies to routes without their own timeout. Zero disables it.
    pub timeout: Option<Duration>,
    pub user_agent: String,
    /// Default `Accept` media type.
    pub accept: String,
    /// Extra headers sent with every request.
    pub headers: BTreeMap<String, String>,
    pub auth: Auth,
}

/// Partial configuration, typically deserialized by the embedding
/// application from its own settings file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigOverrides {
    pub protocol: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path_prefix: Option<String>,
    pub timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
    pub accept: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub auth: Option<Auth>,
}

impl ClientConfig {
    pub fn from_constants(constants: &ApiConstants) -> Self {
        Self {
            protocol: constants.protocol.clone(),
            host: constants.host.clone(),
            port: constants.port,
            path_prefix: constants.path_prefix.clone(),
            timeout: None,
            user_agent: default_user_agent(),
            accept: constants.request_media.clone(),
            headers: BTreeMap::new(),
            auth: Auth::None,
        }
    }

    pub fn apply(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(protocol) = overrides.protocol {
            self.protocol = protocol;
        }
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if overrides.port.is_some() {
            self.port = overrides.port;
        }
        if let Some(prefix) = overrides.path_prefix {
            self.path_prefix = prefix;
        }
        if let Some(millis) = overrides.timeout_ms {
            self.timeout = Some(Duration::from_millis(millis));
        }
        if let Some(user_agent) = overrides.user_agent {
            self.user_agent = user_agent;
        }
        if let Some(accept) = overrides.accept {
            self.accept = accept;
        }
        self.headers.extend(overrides.headers);
        if let Some(auth) = overrides.auth {
            self.auth = auth;
        }
        self
    }

    /// Point every route at `base`, e.g. `http://127.0.0.1:8080/api/v3`.
    pub fn with_base_url(mut self, base: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(base)?;
        let host = url.host_str().ok_or(url::ParseError::EmptyHost)?;
        self.protocol = url.scheme().to_string();
        self.host = host.to_string();
        self.port = url.port();
        self.path_prefix = url.path().trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// `protocol://host[:port]prefix` for a route, honoring a host override.
    /// The port is left out when it is the protocol's default.
    pub fn base_url(&self, host_override: Option<&str>) -> String {
        let host = host_override.unwrap_or(&self.host);
        let default_port = match self.protocol.as_str() {
            "http" => 80,
            _ => 443,
        };
        match self.port {
            Some(port) if port != default_port => {
                format!("{}://{host}:{port}{}", self.protocol, self.path_prefix)
            }
            _ => format!("{}://{host}{}", self.protocol, self.path_prefix),
        }
    }
}
