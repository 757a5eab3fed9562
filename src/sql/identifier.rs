//! Validated SQL identifiers.

use crate::error::{GatewayError, GatewayResult};
use std::fmt;

/// A schema, table, column, index or role name that matches
/// `^[A-Za-z_][A-Za-z0-9_]*$`.
///
/// The only way to obtain one is [`Identifier::parse`], so any `Identifier`
/// reaching the statement builder is safe to interpolate once quoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Validate `value` as the identifier argument named `argument`.
    pub fn parse(argument: &str, value: &str) -> GatewayResult<Self> {
        if is_valid_identifier(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(GatewayError::invalid_identifier(argument, value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Delimited form, e.g. `"orders"`.
    pub fn quoted(&self) -> String {
        // The pattern admits no double quotes, so no escaping is needed.
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check a name against the identifier pattern.
pub fn is_valid_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Quote an arbitrary name as a delimited identifier, doubling embedded quotes.
///
/// Used for names read back from the catalog (e.g. column names in SQL dumps),
/// which are not user input and need not match the identifier pattern.
pub fn quote_name(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_valid_identifiers() {
        for name in ["orders", "_tmp", "A1", "user_2024", "x", "_"] {
            assert!(is_valid_identifier(name), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_identifiers() {
        for name in [
            "",
            "1abc",
            "with space",
            "semi;colon",
            "quote\"d",
            "dash-ed",
            "dot.ted",
            "ünïcode",
            "tab\t",
        ] {
            assert!(!is_valid_identifier(name), "{name:?} should be invalid");
        }
    }

    #[test]
    fn test_parse_reports_argument() {
        let err = Identifier::parse("table", "users; DROP").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);
        assert!(err.to_string().contains("table"));
    }

    #[test]
    fn test_quoted() {
        let id = Identifier::parse("schema", "Public").unwrap();
        assert_eq!(id.quoted(), "\"Public\"");
        assert_eq!(id.to_string(), "Public");
    }

    #[test]
    fn test_quote_name_escapes() {
        assert_eq!(quote_name("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_name("plain"), "\"plain\"");
    }
}
