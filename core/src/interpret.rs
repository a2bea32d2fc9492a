//! Response interpretation: classify by status, decode by content type.
//!
//! # Design
//! Classification looks at the status code only:
//! - 2xx and 304 are successes
//! - 401/403 are `Auth`, 404 is `NotFound`, 422 is `RemoteValidation`
//! - everything else is `Remote`
//!
//! Error bodies are decoded leniently (a bad JSON error body degrades to
//! text); only a success body that claims JSON and fails to parse is a
//! `Decode` error, which still carries the response. Pagination links are
//! parsed for every response, failures included.

use serde_json::Value;

use crate::error::{ApiError, FieldError, RemoteFailure};
use crate::http::HttpResponse;
use crate::pagination::Pagination;
use crate::response::{Payload, ResponseEnvelope, ResponseMeta};

fn is_json(content_type: &str) -> bool {
    let media = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media == "application/json" || media.ends_with("+json")
}

fn is_text(content_type: &str) -> bool {
    let media = content_type.trim_start().to_ascii_lowercase();
    media.starts_with("text/") || media.starts_with("application/xml")
}

/// Decode a body according to the response's content type. Bodies without a
/// content type are treated as text when they are valid UTF-8.
fn decode(response: &HttpResponse) -> Result<Payload, serde_json::Error> {
    if response.body.is_empty() {
        return Ok(Payload::Empty);
    }
    let content_type = response.header("content-type").unwrap_or_default();
    if is_json(content_type) {
        return serde_json::from_slice(&response.body).map(Payload::Json);
    }
    let text_like = content_type.is_empty() || is_text(content_type);
    match std::str::from_utf8(&response.body) {
        Ok(text) if text_like => Ok(Payload::Text(text.to_string())),
        _ => Ok(Payload::Bytes(response.body.clone())),
    }
}

fn lenient_decode(response: &HttpResponse) -> Payload {
    decode(response).unwrap_or_else(|_| match String::from_utf8(response.body.clone()) {
        Ok(text) => Payload::Text(text),
        Err(err) => Payload::Bytes(err.into_bytes()),
    })
}

fn link_relations(response: &HttpResponse) -> Pagination {
    response
        .header("link")
        .map(Pagination::parse)
        .unwrap_or_default()
}

fn remote_failure(response: HttpResponse, meta: ResponseMeta) -> RemoteFailure {
    let body = lenient_decode(&response);
    let message = body
        .as_json()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let pagination = link_relations(&response);
    RemoteFailure {
        status: response.status,
        message,
        headers: response.headers,
        meta,
        body,
        pagination,
    }
}

fn field_errors(body: &Payload) -> Vec<FieldError> {
    body.as_json()
        .and_then(|v| v.get("errors"))
        .and_then(Value::as_array)
        .map(|errors| errors.iter().filter_map(FieldError::from_value).collect())
        .unwrap_or_default()
}

/// Turn a raw response into a decoded envelope or a classified error.
/// `recognized` names the response headers surfaced through `ResponseMeta`.
pub fn interpret(response: HttpResponse, recognized: &[String]) -> Result<ResponseEnvelope, ApiError> {
    let meta = ResponseMeta::collect(&response.headers, recognized);

    match response.status {
        200..=299 | 304 => {
            let body = match decode(&response) {
                Ok(body) => body,
                Err(err) => {
                    return Err(ApiError::Decode {
                        error: err.to_string(),
                        failure: remote_failure(response, meta),
                    })
                }
            };
            let pagination = link_relations(&response);
            Ok(ResponseEnvelope {
                status: response.status,
                headers: response.headers,
                meta,
                body,
                pagination,
            })
        }
        401 | 403 => Err(ApiError::Auth(remote_failure(response, meta))),
        404 => Err(ApiError::NotFound(remote_failure(response, meta))),
        422 => {
            let failure = remote_failure(response, meta);
            let errors = field_errors(&failure.body);
            Err(ApiError::RemoteValidation { failure, errors })
        }
        _ => Err(ApiError::Remote(remote_failure(response, meta))),
    }
}
