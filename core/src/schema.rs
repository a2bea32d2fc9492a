//! Parameter schemas: the declarative contract for one named argument.
//!
//! # Design
//! Route tables describe parameters either inline or by `$name` reference to
//! a shared dictionary. Both shapes are captured by `ParamSpec` and resolved
//! into a canonical `ParameterSchema` once, when the registry is built, so
//! binding never performs a dictionary lookup.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ParamKind {
    String,
    Number,
    Boolean,
    Date,
    Array,
    /// Opaque JSON, forwarded as-is.
    Json,
    Raw,
}

/// Inline parameter definition as written in a route table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParamDef {
    #[serde(rename = "type")]
    pub kind: ParamKind,
    #[serde(default)]
    pub required: bool,
    /// Regular expression the value must match. Empty means none.
    #[serde(default)]
    pub validation: String,
    #[serde(default, rename = "invalidmsg")]
    pub invalid_message: String,
    #[serde(default)]
    pub description: String,
    /// Search-style value whose `+`-separated parts are encoded individually.
    #[serde(default)]
    pub combined: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

impl ParamDef {
    pub fn new(kind: ParamKind) -> Self {
        Self {
            kind,
            required: false,
            validation: String::new(),
            invalid_message: String::new(),
            description: String::new(),
            combined: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn pattern(mut self, validation: impl Into<String>) -> Self {
        self.validation = validation.into();
        self
    }

    pub fn invalid_message(mut self, message: impl Into<String>) -> Self {
        self.invalid_message = message.into();
        self
    }

    pub fn combined(mut self) -> Self {
        self.combined = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// A parameter as it appears in a route: a reference or a full definition.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSpec {
    /// `$name`: reuse the shared definition called `name`.
    Shorthand(String),
    Full(String, ParamDef),
}

impl ParamSpec {
    pub fn name(&self) -> &str {
        match self {
            ParamSpec::Shorthand(name) | ParamSpec::Full(name, _) => name,
        }
    }
}

/// Where a bound value ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    /// Substituted for `:name` in the URL template.
    Path,
    /// Sent as a query pair or as part of the body.
    Payload,
}

/// Canonical, fully resolved parameter schema.
#[derive(Debug, Clone)]
pub struct ParameterSchema {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub pattern: Option<Regex>,
    pub invalid_message: String,
    pub description: String,
    pub combined: bool,
    pub default: Option<Value>,
    pub location: ParamLocation,
}

impl ParameterSchema {
    /// Compile `def` for a route. Path parameters are always required.
    pub fn resolve(
        name: &str,
        def: &ParamDef,
        location: ParamLocation,
    ) -> Result<Self, regex::Error> {
        let pattern = match def.validation.as_str() {
            "" => None,
            source => Some(Regex::new(source)?),
        };
        Ok(Self {
            name: name.to_string(),
            kind: def.kind,
            required: def.required || location == ParamLocation::Path,
            pattern,
            invalid_message: def.invalid_message.clone(),
            description: def.description.clone(),
            combined: def.combined,
            default: def.default.clone(),
            location,
        })
    }

    pub fn is_path(&self) -> bool {
        self.location == ParamLocation::Path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_def_deserializes_route_table_shape() {
        let def: ParamDef = serde_json::from_str(
            r#"{"type":"String","required":false,"validation":"^(open|closed)$","invalidmsg":"open, closed, default: open","description":""}"#,
        )
        .unwrap();
        assert_eq!(def.kind, ParamKind::String);
        assert!(!def.required);
        assert_eq!(def.invalid_message, "open, closed, default: open");
        assert!(!def.combined);
    }

    #[test]
    fn path_location_forces_required() {
        let def = ParamDef::new(ParamKind::String);
        let schema = ParameterSchema::resolve("user", &def, ParamLocation::Path).unwrap();
        assert!(schema.required);
        assert!(schema.is_path());

        let schema = ParameterSchema::resolve("page", &def, ParamLocation::Payload).unwrap();
        assert!(!schema.required);
    }

    #[test]
    fn empty_validation_means_no_pattern() {
        let schema = ParameterSchema::resolve(
            "x",
            &ParamDef::new(ParamKind::Number).pattern(""),
            ParamLocation::Payload,
        )
        .unwrap();
        assert!(schema.pattern.is_none());
    }

    #[test]
    fn bad_pattern_is_rejected() {
        let def = ParamDef::new(ParamKind::String).pattern("^(open|closed$");
        assert!(ParameterSchema::resolve("state", &def, ParamLocation::Payload).is_err());
    }
}
