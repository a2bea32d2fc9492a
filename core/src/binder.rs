//! Parameter binding: match caller arguments against a route's schema.
//!
//! # Design
//! - Path parameters must be present and non-empty; they are percent-encoded
//!   here so the request builder only has to splice them in.
//! - Payload parameters are validated per `ParamKind` and keep their JSON
//!   shape for the request builder to encode.
//! - Unknown argument names are ignored so route tables may lag the API.
//! - Binding is pure: the same route and arguments always bind identically.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Number, Value};
use tracing::debug;

use crate::args::Arguments;
use crate::builder::encode_component;
use crate::error::ValidationError;
use crate::route::{BodyEncoding, RouteDescriptor};
use crate::schema::{ParamKind, ParameterSchema};

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}Z$").expect("timestamp pattern is valid")
});

/// Arguments partitioned by destination.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArguments {
    /// Token name to percent-encoded value.
    pub path: Vec<(String, String)>,
    /// Query or body values, in route parameter order.
    pub payload: Vec<(String, Value)>,
    /// Binary body for multipart-file routes.
    pub file: Option<Vec<u8>>,
}

impl BoundArguments {
    pub fn path_value(&self, name: &str) -> Option<&str> {
        self.path
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn payload_value(&self, name: &str) -> Option<&Value> {
        self.payload.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Validate `args` against `route` and split them into path and payload
/// values. Fails on the first offending parameter.
pub fn bind(route: &RouteDescriptor, args: &Arguments) -> Result<BoundArguments, ValidationError> {
    for name in args.names() {
        if route.param(name).is_none() {
            debug!(route = %route.key, parameter = name, "ignoring unknown argument");
        }
    }

    let mut bound = BoundArguments {
        path: Vec::new(),
        payload: Vec::new(),
        file: None,
    };

    for schema in &route.params {
        let value = match args.get(&schema.name) {
            Some(value) => value.clone(),
            None => match (&schema.default, schema.is_path()) {
                (Some(default), false) => default.clone(),
                _ if schema.required => {
                    return Err(ValidationError::missing(
                        &schema.name,
                        &schema.invalid_message,
                    ))
                }
                _ => continue,
            },
        };
        let value = check(schema, value)?;

        if schema.is_path() {
            let text = value_text(&value);
            if text.is_empty() {
                return Err(invalid(schema, "path value must not be empty"));
            }
            bound.path.push((schema.name.clone(), encode_component(&text)));
        } else {
            bound.payload.push((schema.name.clone(), value));
        }
    }

    if route.encoding == BodyEncoding::MultipartFile {
        match args.file_body() {
            Some(content) => bound.file = Some(content.to_vec()),
            None => return Err(ValidationError::missing("file", "file content is required")),
        }
    }

    Ok(bound)
}

/// Validate one present value and return it in its bound form.
fn check(schema: &ParameterSchema, value: Value) -> Result<Value, ValidationError> {
    match schema.kind {
        ParamKind::String => {
            let text = match &value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err(invalid(schema, "expected a string")),
            };
            matches_pattern(schema, &text)?;
            Ok(value)
        }
        ParamKind::Number => {
            let number = match &value {
                Value::Number(n) => Some(n.clone()),
                Value::String(s) => parse_number(s.trim()),
                _ => None,
            }
            .map(collapse_integral)
            .ok_or_else(|| invalid(schema, "expected a finite number"))?;
            matches_pattern(schema, &number.to_string())?;
            Ok(Value::Number(number))
        }
        ParamKind::Boolean => match value {
            Value::Bool(_) => Ok(value),
            _ => Err(invalid(schema, "expected a boolean")),
        },
        ParamKind::Date => match &value {
            Value::String(s) if TIMESTAMP.is_match(s) => Ok(value),
            _ => Err(invalid(
                schema,
                "expected an ISO-8601 timestamp (YYYY-MM-DDTHH:MM:SSZ)",
            )),
        },
        ParamKind::Array | ParamKind::Json | ParamKind::Raw => Ok(value),
    }
}

fn matches_pattern(schema: &ParameterSchema, text: &str) -> Result<(), ValidationError> {
    match &schema.pattern {
        Some(pattern) if !pattern.is_match(text) => Err(invalid(
            schema,
            format!("`{text}` does not match {}", pattern.as_str()),
        )),
        _ => Ok(()),
    }
}

fn parse_number(text: &str) -> Option<Number> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::from(i));
    }
    if let Ok(u) = text.parse::<u64>() {
        return Some(Number::from(u));
    }
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
}

/// `7.0` renders as `7`, so whole floats satisfy integer patterns and
/// substitute into paths the same way integers do.
fn collapse_integral(number: Number) -> Number {
    match number.as_f64() {
        Some(f)
            if number.is_f64()
                && f.fract() == 0.0
                && f >= i64::MIN as f64
                && f < i64::MAX as f64 =>
        {
            Number::from(f as i64)
        }
        _ => number,
    }
}

fn invalid(schema: &ParameterSchema, detail: impl Into<String>) -> ValidationError {
    ValidationError::invalid(&schema.name, detail, &schema.invalid_message)
}

/// Text form of a bound value for URLs and form bodies. Structured values
/// are sent as their JSON text.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
