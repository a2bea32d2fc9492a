//! Request building: turn bound arguments into a wire-ready `HttpRequest`.
//!
//! # Design
//! - GET and DELETE routes carry payload values in the query string; other
//!   methods encode them per the route's `BodyEncoding`.
//! - Headers merge in increasing precedence: engine defaults, client-wide
//!   defaults and credentials, then recognized per-call headers.
//! - No timestamps or nonces are injected, so identical input yields a
//!   byte-identical request.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};
use tracing::debug;

use crate::binder::{value_text, BoundArguments};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HeaderSet, HttpRequest};
use crate::route::{BodyEncoding, RouteDescriptor};

/// Everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub(crate) fn encode_component(text: &str) -> String {
    utf8_percent_encode(text, COMPONENT).to_string()
}

/// Search-style values keep literal `+` separators between encoded parts.
fn encode_combined(text: &str) -> String {
    text.split('+')
        .map(|part| encode_component(part.trim()))
        .collect::<Vec<_>>()
        .join("+")
}

fn query_pairs(route: &RouteDescriptor, payload: &[(String, Value)]) -> Vec<String> {
    payload
        .iter()
        .map(|(name, value)| {
            let text = value_text(value);
            let combined = route.param(name).is_some_and(|p| p.combined);
            let encoded = if combined {
                encode_combined(&text)
            } else {
                encode_component(&text)
            };
            format!("{}={encoded}", encode_component(name))
        })
        .collect()
}

/// Best-effort media type for an uploaded file name.
fn media_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "tar" => "application/x-tar",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "html" => "text/html",
        _ => "application/octet-stream",
    }
}

/// Assemble the request for `route`. `call_headers` are filtered against the
/// `recognized` request-header names; anything else is dropped.
pub fn build(
    route: &RouteDescriptor,
    bound: &BoundArguments,
    call_headers: &[(String, String)],
    recognized: &[String],
    config: &ClientConfig,
) -> Result<HttpRequest, ApiError> {
    let path = route
        .template
        .resolve(|name| bound.path_value(name))
        .map_err(|token| {
            ApiError::Build(format!(
                "{}: token `:{token}` left unresolved in {}",
                route.key,
                route.template.as_str()
            ))
        })?;

    let mut headers = HeaderSet::default();
    headers.insert("user-agent", config.user_agent.as_str());
    headers.insert("accept", config.accept.as_str());

    let mut query = Vec::new();
    let body = match route.encoding {
        BodyEncoding::Json | BodyEncoding::Form if route.method.sends_query() => {
            query.extend(query_pairs(route, &bound.payload));
            None
        }
        BodyEncoding::Json => {
            let object: Map<String, Value> = bound.payload.iter().cloned().collect();
            headers.insert("content-type", "application/json; charset=utf-8");
            Some(Value::Object(object).to_string().into_bytes())
        }
        BodyEncoding::Form => {
            headers.insert(
                "content-type",
                "application/x-www-form-urlencoded; charset=utf-8",
            );
            Some(query_pairs(route, &bound.payload).join("&").into_bytes())
        }
        BodyEncoding::Raw => {
            let text = route
                .raw_field
                .as_deref()
                .and_then(|field| bound.payload_value(field))
                .map(value_text)
                .unwrap_or_default();
            headers.insert("content-type", "text/plain; charset=utf-8");
            Some(text.into_bytes())
        }
        BodyEncoding::MultipartFile => {
            query.extend(query_pairs(route, &bound.payload));
            let media = bound
                .payload_value("name")
                .and_then(Value::as_str)
                .map_or("application/octet-stream", media_type_for);
            headers.insert("content-type", media);
            bound.file.clone()
        }
    };

    if let Some(authorization) = config.auth.header() {
        headers.insert("authorization", authorization);
    }
    for (name, value) in config.auth.query_pairs() {
        query.push(format!("{name}={}", encode_component(value)));
    }
    for (name, value) in &config.headers {
        headers.insert(name, value.as_str());
    }
    for (name, value) in call_headers {
        if recognized.iter().any(|r| r.eq_ignore_ascii_case(name)) {
            headers.insert(name, value.as_str());
        } else {
            debug!(route = %route.key, header = %name, "dropping unrecognized request header");
        }
    }

    let mut url = config.base_url(route.host.as_deref());
    url.push_str(&path);
    if !query.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&query.join("&"));
    }

    let timeout = route
        .timeout
        .or(config.timeout)
        .filter(|timeout| !timeout.is_zero());

    Ok(HttpRequest {
        method: route.method,
        url,
        headers: headers.into_vec(),
        body,
        timeout,
    })
}
