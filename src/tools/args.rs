//! Argument specifications and parsed argument values.
//!
//! Each operation declares its arguments as a `&'static [ArgSpec]`. The same
//! list drives the published JSON schema and [`Args::parse`], which checks
//! presence and types, fills defaults and validates identifiers before the
//! policy gate runs.

use crate::error::{GatewayError, GatewayResult};
use crate::sql::{Identifier, TrustedFragment};
use serde_json::{Map, Value as JsonValue, json};
use std::collections::HashMap;

/// JSON-level type of an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Free text, bound as a parameter.
    Text,
    /// Validated against the identifier pattern as supplied, untrimmed, and quoted.
    Identifier,
    /// Raw SQL text interpolated verbatim, untrimmed. Dangerous operations only.
    Fragment,
    /// Bound like `Text` but never trimmed or printed.
    Secret,
    Bool,
    Int,
}

impl ArgKind {
    fn json_type(self) -> &'static str {
        match self {
            Self::Text | Self::Identifier | Self::Fragment | Self::Secret => "string",
            Self::Bool => "boolean",
            Self::Int => "integer",
        }
    }
}

/// Value used when an optional argument is omitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgDefault {
    Text(&'static str),
    Bool(bool),
    Int(i64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Presence {
    Required,
    Optional,
    Default(ArgDefault),
}

/// Static description of one operation argument.
#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub presence: Presence,
    pub description: &'static str,
    /// Extra guidance attached to a missing-argument error.
    pub hint: Option<&'static str>,
}

impl ArgSpec {
    const fn new(name: &'static str, kind: ArgKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Required,
            description,
            hint: None,
        }
    }

    pub const fn text(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ArgKind::Text, description)
    }

    pub const fn ident(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ArgKind::Identifier, description)
    }

    pub const fn fragment(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ArgKind::Fragment, description)
    }

    pub const fn secret(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ArgKind::Secret, description)
    }

    /// Optional boolean defaulting to `default`.
    pub const fn flag(name: &'static str, default: bool, description: &'static str) -> Self {
        Self::new(name, ArgKind::Bool, description).default_to(ArgDefault::Bool(default))
    }

    /// Optional boolean with no default; absence means "leave unchanged".
    pub const fn tri_state(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ArgKind::Bool, description).optional()
    }

    pub const fn int(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ArgKind::Int, description)
    }

    pub const fn optional(mut self) -> Self {
        self.presence = Presence::Optional;
        self
    }

    pub const fn default_text(self, value: &'static str) -> Self {
        self.default_to(ArgDefault::Text(value))
    }

    pub const fn default_int(self, value: i64) -> Self {
        self.default_to(ArgDefault::Int(value))
    }

    const fn default_to(mut self, value: ArgDefault) -> Self {
        self.presence = Presence::Default(value);
        self
    }

    pub const fn with_hint(mut self, hint: &'static str) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn is_required(&self) -> bool {
        self.presence == Presence::Required
    }

    /// JSON schema fragment for this argument.
    pub fn schema(&self) -> JsonValue {
        let mut prop = Map::new();
        prop.insert("type".into(), json!(self.kind.json_type()));
        prop.insert("description".into(), json!(self.description));
        if let Presence::Default(default) = self.presence {
            let value = match default {
                ArgDefault::Text(v) => json!(v),
                ArgDefault::Bool(v) => json!(v),
                ArgDefault::Int(v) => json!(v),
            };
            prop.insert("default".into(), value);
        }
        if self.kind == ArgKind::Identifier {
            prop.insert("pattern".into(), json!("^[A-Za-z_][A-Za-z0-9_]*$"));
        }
        JsonValue::Object(prop)
    }
}

/// A parsed, type-checked argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Text(String),
    Ident(Identifier),
    Fragment(TrustedFragment),
    Secret(Secret),
    Bool(bool),
    Int(i64),
}

/// A password or similar value. `Debug` does not reveal it.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Arguments of one invocation, after validation and defaulting.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: HashMap<&'static str, ArgValue>,
}

impl Args {
    /// Validate `input` against `specs`.
    ///
    /// Null and blank strings count as absent. Only `Text` values are
    /// trimmed. Unknown argument names are rejected so that a typo never
    /// silently drops a clause.
    pub fn parse(
        specs: &'static [ArgSpec],
        input: Option<&Map<String, JsonValue>>,
    ) -> GatewayResult<Self> {
        let empty = Map::new();
        let input = input.unwrap_or(&empty);

        if let Some(unknown) = input.keys().find(|k| !specs.iter().any(|s| s.name == *k)) {
            let known: Vec<&str> = specs.iter().map(|s| s.name).collect();
            let hint = if known.is_empty() {
                "this operation takes no arguments".to_string()
            } else {
                format!("accepted arguments: {}", known.join(", "))
            };
            return Err(GatewayError::invalid_argument_with_hint(
                format!("unknown argument '{unknown}'"),
                hint,
            ));
        }

        let mut values = HashMap::with_capacity(specs.len());
        for spec in specs {
            let supplied = input.get(spec.name).filter(|v| !is_blank(v));
            let value = match (supplied, spec.presence) {
                (Some(raw), _) => Some(convert(spec, raw)?),
                (None, Presence::Required) => {
                    let message = format!("{} is required", spec.name);
                    return Err(match spec.hint {
                        Some(hint) => GatewayError::invalid_argument_with_hint(message, hint),
                        None => GatewayError::invalid_argument(message),
                    });
                }
                (None, Presence::Optional) => None,
                (None, Presence::Default(default)) => Some(default_value(spec, default)?),
            };
            if let Some(value) = value {
                values.insert(spec.name, value);
            }
        }
        Ok(Self { values })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn opt_text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::Text(v)) => Some(v),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> GatewayResult<&str> {
        self.opt_text(name).ok_or_else(|| missing(name))
    }

    pub fn opt_ident(&self, name: &str) -> Option<&Identifier> {
        match self.values.get(name) {
            Some(ArgValue::Ident(v)) => Some(v),
            _ => None,
        }
    }

    pub fn ident(&self, name: &str) -> GatewayResult<&Identifier> {
        self.opt_ident(name).ok_or_else(|| missing(name))
    }

    pub fn opt_fragment(&self, name: &str) -> Option<&TrustedFragment> {
        match self.values.get(name) {
            Some(ArgValue::Fragment(v)) => Some(v),
            _ => None,
        }
    }

    pub fn fragment(&self, name: &str) -> GatewayResult<&TrustedFragment> {
        self.opt_fragment(name).ok_or_else(|| missing(name))
    }

    pub fn opt_secret(&self, name: &str) -> Option<&Secret> {
        match self.values.get(name) {
            Some(ArgValue::Secret(v)) => Some(v),
            _ => None,
        }
    }

    pub fn secret(&self, name: &str) -> GatewayResult<&Secret> {
        self.opt_secret(name).ok_or_else(|| missing(name))
    }

    pub fn opt_flag(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ArgValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    /// Boolean argument; absent counts as `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.opt_flag(name).unwrap_or(false)
    }

    pub fn int(&self, name: &str) -> GatewayResult<i64> {
        match self.values.get(name) {
            Some(ArgValue::Int(v)) => Ok(*v),
            _ => Err(missing(name)),
        }
    }

    /// Integer argument that must be at least 1.
    pub fn positive_int(&self, name: &str) -> GatewayResult<i64> {
        let value = self.int(name)?;
        if value < 1 {
            return Err(GatewayError::invalid_argument(format!(
                "{name} must be a positive integer, got {value}"
            )));
        }
        Ok(value)
    }
}

fn missing(name: &str) -> GatewayError {
    GatewayError::internal(format!("argument '{name}' was not declared"))
}

fn is_blank(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn convert(spec: &ArgSpec, raw: &JsonValue) -> GatewayResult<ArgValue> {
    let type_error = || {
        GatewayError::invalid_argument(format!(
            "{} must be of type {}",
            spec.name,
            spec.kind.json_type()
        ))
    };

    match spec.kind {
        ArgKind::Text => raw
            .as_str()
            .map(|s| ArgValue::Text(s.trim().to_string()))
            .ok_or_else(type_error),
        ArgKind::Identifier => {
            let text = raw.as_str().ok_or_else(type_error)?;
            Identifier::parse(spec.name, text).map(ArgValue::Ident)
        }
        ArgKind::Fragment => {
            let text = raw.as_str().ok_or_else(type_error)?;
            TrustedFragment::new(spec.name, text).map(ArgValue::Fragment)
        }
        ArgKind::Secret => raw
            .as_str()
            .map(|s| ArgValue::Secret(Secret(s.to_string())))
            .ok_or_else(type_error),
        ArgKind::Bool => match raw {
            JsonValue::Bool(b) => Ok(ArgValue::Bool(*b)),
            JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(ArgValue::Bool(true)),
                "false" => Ok(ArgValue::Bool(false)),
                _ => Err(type_error()),
            },
            _ => Err(type_error()),
        },
        ArgKind::Int => match raw {
            JsonValue::Number(n) => n.as_i64().map(ArgValue::Int).ok_or_else(type_error),
            JsonValue::String(s) => s.trim().parse().map(ArgValue::Int).map_err(|_| type_error()),
            _ => Err(type_error()),
        },
    }
}

fn default_value(spec: &ArgSpec, default: ArgDefault) -> GatewayResult<ArgValue> {
    match (spec.kind, default) {
        (ArgKind::Text, ArgDefault::Text(v)) => Ok(ArgValue::Text(v.to_string())),
        (ArgKind::Identifier, ArgDefault::Text(v)) => {
            Identifier::parse(spec.name, v).map(ArgValue::Ident)
        }
        (ArgKind::Bool, ArgDefault::Bool(v)) => Ok(ArgValue::Bool(v)),
        (ArgKind::Int, ArgDefault::Int(v)) => Ok(ArgValue::Int(v)),
        _ => Err(GatewayError::internal(format!(
            "default for '{}' does not match its kind",
            spec.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    static SPECS: &[ArgSpec] = &[
        ArgSpec::ident("schema", "Schema name").default_text("public"),
        ArgSpec::ident("table", "Table name"),
        ArgSpec::fragment("where_clause", "Row filter").with_hint("use pg_truncate_table"),
        ArgSpec::flag("cascade", false, "Cascade"),
        ArgSpec::int("limit", "Row cap").default_int(10),
        ArgSpec::tri_state("login", "Login"),
    ];

    fn parse(value: JsonValue) -> GatewayResult<Args> {
        Args::parse(SPECS, value.as_object())
    }

    #[test]
    fn test_defaults_fill_in() {
        let args = parse(json!({"table": "orders", "where_clause": "id = 1"})).unwrap();
        assert_eq!(args.ident("schema").unwrap().as_str(), "public");
        assert_eq!(args.int("limit").unwrap(), 10);
        assert!(!args.flag("cascade"));
        assert_eq!(args.opt_flag("login"), None);
    }

    #[test]
    fn test_missing_required_carries_hint() {
        let err = parse(json!({"table": "orders"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("where_clause is required"));
        assert_eq!(err.hint(), Some("use pg_truncate_table"));
    }

    #[test]
    fn test_blank_counts_as_missing() {
        let err = parse(json!({"table": "orders", "where_clause": "   "})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let args = parse(json!({"schema": null, "table": "t", "where_clause": "x"})).unwrap();
        assert_eq!(args.ident("schema").unwrap().as_str(), "public");
    }

    #[test]
    fn test_identifier_validated_at_parse() {
        let err = parse(json!({"table": "orders; drop", "where_clause": "x"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);
    }

    #[test]
    fn test_identifier_not_trimmed() {
        for table in [" orders", "orders\n", "orders "] {
            let err = parse(json!({"table": table, "where_clause": "x"})).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidIdentifier, "{table:?}");
        }
        let err = parse(json!({"schema": " public ", "table": "t", "where_clause": "x"}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);
    }

    #[test]
    fn test_unknown_argument_rejected() {
        let err = parse(json!({"table": "t", "where_clause": "x", "wher": "y"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("unknown argument 'wher'"));
    }

    #[test]
    fn test_type_mismatch() {
        let err = parse(json!({"table": "t", "where_clause": "x", "limit": true})).unwrap_err();
        assert!(err.to_string().contains("limit must be of type integer"));
    }

    #[test]
    fn test_lenient_scalars() {
        let args = parse(json!({
            "table": "t", "where_clause": "x", "cascade": "TRUE", "limit": "25", "login": false
        }))
        .unwrap();
        assert!(args.flag("cascade"));
        assert_eq!(args.int("limit").unwrap(), 25);
        assert_eq!(args.opt_flag("login"), Some(false));
    }

    #[test]
    fn test_secret_kept_verbatim_and_hidden() {
        static SECRET: &[ArgSpec] = &[ArgSpec::secret("password", "Password")];
        let args = Args::parse(SECRET, json!({"password": " p w "}).as_object()).unwrap();
        assert_eq!(args.secret("password").unwrap().expose(), " p w ");
        assert!(!format!("{args:?}").contains("p w"));
    }

    #[test]
    fn test_schema_fragment() {
        let schema = SPECS[0].schema();
        assert_eq!(schema["type"], "string");
        assert_eq!(schema["default"], "public");
        assert_eq!(SPECS[3].schema()["default"], false);
        assert_eq!(SPECS[4].schema()["type"], "integer");
    }
}
