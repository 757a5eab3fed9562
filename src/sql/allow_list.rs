//! Fixed allow-lists for keyword choices interpolated into statements.
//!
//! Each function maps caller input onto a `&'static str` owned by this module,
//! so nothing the caller typed is ever copied into SQL text.

use crate::error::{GatewayError, GatewayResult};

const INDEX_METHODS: &[&str] = &["btree", "hash", "gist", "gin", "brin", "spgist"];

const ENCODINGS: &[&str] = &[
    "UTF8",
    "SQL_ASCII",
    "LATIN1",
    "LATIN2",
    "LATIN9",
    "WIN1250",
    "WIN1251",
    "WIN1252",
    "KOI8R",
    "EUC_JP",
    "EUC_KR",
    "EUC_CN",
    "ISO_8859_5",
];

const PRIVILEGES: &[&str] = &[
    "SELECT",
    "INSERT",
    "UPDATE",
    "DELETE",
    "TRUNCATE",
    "REFERENCES",
    "TRIGGER",
];

/// Resolve an index access method.
pub fn index_method(input: &str) -> GatewayResult<&'static str> {
    let wanted = input.trim().to_ascii_lowercase();
    INDEX_METHODS
        .iter()
        .copied()
        .find(|m| *m == wanted)
        .ok_or_else(|| {
            GatewayError::invalid_argument(format!(
                "unsupported index method '{}'; expected one of: {}",
                input.trim(),
                INDEX_METHODS.join(", ")
            ))
        })
}

/// Resolve a server encoding. Accepts `utf-8`, `Utf8` and similar spellings.
pub fn encoding(input: &str) -> GatewayResult<&'static str> {
    let wanted: String = input
        .trim()
        .to_ascii_uppercase()
        .chars()
        .filter(|c| *c != '-')
        .collect();
    ENCODINGS
        .iter()
        .copied()
        .find(|e| e.replace('_', "") == wanted.replace('_', ""))
        .ok_or_else(|| {
            GatewayError::invalid_argument(format!(
                "unsupported encoding '{}'; expected one of: {}",
                input.trim(),
                ENCODINGS.join(", ")
            ))
        })
}

/// Parse a comma-separated privilege list such as `"select, insert"`.
///
/// Returns canonical upper-case keywords in input order without duplicates.
/// `ALL` / `ALL PRIVILEGES` must appear alone.
pub fn privileges(input: &str) -> GatewayResult<Vec<&'static str>> {
    let items: Vec<String> = input
        .split(',')
        .map(|p| {
            p.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_ascii_uppercase()
        })
        .collect();

    if items.iter().any(String::is_empty) {
        return Err(GatewayError::invalid_argument(
            "privileges must be a comma-separated list such as \"SELECT, INSERT\"",
        ));
    }

    if items.len() == 1 && (items[0] == "ALL" || items[0] == "ALL PRIVILEGES") {
        return Ok(vec!["ALL PRIVILEGES"]);
    }

    let mut resolved: Vec<&'static str> = Vec::with_capacity(items.len());
    for item in &items {
        let privilege = PRIVILEGES
            .iter()
            .copied()
            .find(|p| p == item)
            .ok_or_else(|| {
                GatewayError::invalid_argument(format!(
                    "unsupported privilege '{}'; expected ALL PRIVILEGES or any of: {}",
                    item,
                    PRIVILEGES.join(", ")
                ))
            })?;
        if !resolved.contains(&privilege) {
            resolved.push(privilege);
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_method() {
        assert_eq!(index_method("BTREE").unwrap(), "btree");
        assert_eq!(index_method(" gin ").unwrap(), "gin");
        assert!(index_method("btree; DROP TABLE x").is_err());
    }

    #[test]
    fn test_encoding_spellings() {
        assert_eq!(encoding("UTF8").unwrap(), "UTF8");
        assert_eq!(encoding("utf-8").unwrap(), "UTF8");
        assert_eq!(encoding("sql_ascii").unwrap(), "SQL_ASCII");
        assert!(encoding("UTF8' TEMPLATE template0 --").is_err());
    }

    #[test]
    fn test_privileges_normalized() {
        assert_eq!(
            privileges("select,  insert").unwrap(),
            vec!["SELECT", "INSERT"]
        );
        assert_eq!(privileges("SELECT, SELECT").unwrap(), vec!["SELECT"]);
        assert_eq!(privileges("all").unwrap(), vec!["ALL PRIVILEGES"]);
        assert_eq!(
            privileges("all   privileges").unwrap(),
            vec!["ALL PRIVILEGES"]
        );
    }

    #[test]
    fn test_privileges_rejected() {
        assert!(privileges("SELECT, ALL").is_err());
        assert!(privileges("SELECT,").is_err());
        assert!(privileges("SELECT ON x TO y; --").is_err());
        assert!(privileges("").is_err());
    }
}
