//! Lexical safety classifier for ad-hoc SQL.
//!
//! This is a keyword filter, not a parser. A disallowed keyword inside a
//! string literal or an alias is still rejected, and a statement that hides
//! its intent from the filter still runs inside a read-only transaction.

use crate::error::{GatewayError, GatewayResult};
use regex::Regex;
use std::sync::LazyLock;

/// Row cap appended to ad-hoc queries that carry no `LIMIT`.
pub const DEFAULT_ROW_LIMIT: u32 = 1000;

static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:insert|update|delete|merge|create|alter|drop|truncate|grant|revoke|copy|call|do|execute|vacuum|analyze|reindex)\b",
    )
    .expect("disallowed keyword pattern is valid")
});

static SELECT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^select\b").expect("select pattern is valid"));

static LIMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blimit\b").expect("limit pattern is valid"));

static DATABASE_LIFECYCLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:create|drop)\s+database\b").expect("lifecycle pattern is valid")
});

/// Trim whitespace and trailing semicolons.
pub fn normalize(sql: &str) -> &str {
    sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// First disallowed keyword found as a whole word, lower-cased.
pub fn disallowed_keyword(sql: &str) -> Option<String> {
    DISALLOWED.find(sql).map(|m| m.as_str().to_ascii_lowercase())
}

/// Check that `sql` is a plain SELECT with no disallowed keyword.
pub fn ensure_read_only(sql: &str) -> GatewayResult<()> {
    let sql = normalize(sql);
    if let Some(keyword) = disallowed_keyword(sql) {
        return Err(GatewayError::classification_rejected(format!(
            "only SELECT queries are allowed; found disallowed keyword '{keyword}'"
        )));
    }
    if !SELECT_PREFIX.is_match(sql) {
        return Err(GatewayError::classification_rejected(
            "query must start with SELECT",
        ));
    }
    Ok(())
}

/// Classify `sql` and cap its result size.
///
/// Returns the normalized statement, with `LIMIT <max_rows>` appended when
/// it has no `LIMIT` of its own outside comments. A statement ending in a
/// `--` comment gets the cap on a new line.
pub fn prepare_read_query(sql: &str, max_rows: u32) -> GatewayResult<String> {
    ensure_read_only(sql)?;
    let sql = normalize(sql);
    let scan = scan_comments(sql);
    if LIMIT.is_match(&scan.code) {
        return Ok(sql.to_string());
    }
    let separator = if scan.trailing_line_comment { "\n" } else { " " };
    Ok(format!("{sql}{separator}LIMIT {max_rows}"))
}

/// `sql` with comments and quoted text blanked out.
struct CommentScan {
    code: String,
    /// The text ends inside a `--` comment.
    trailing_line_comment: bool,
}

/// Blank out `--` and `/* */` comments and the contents of quoted text.
/// Comment markers inside quotes are not comments.
fn scan_comments(sql: &str) -> CommentScan {
    let mut code = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut trailing_line_comment = false;

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                // A doubled quote closes and reopens, which scans the same.
                code.push(c);
                for q in chars.by_ref() {
                    if q == c {
                        code.push(q);
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                trailing_line_comment = true;
                for n in chars.by_ref() {
                    if n == '\n' {
                        trailing_line_comment = false;
                        code.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
                code.push(' ');
            }
            _ => code.push(c),
        }
    }

    CommentScan {
        code,
        trailing_line_comment,
    }
}

/// Whether `sql` creates or drops a database and so needs autocommit.
pub fn is_database_lifecycle(sql: &str) -> bool {
    DATABASE_LIFECYCLE.is_match(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_simple_select_gets_default_limit() {
        assert_eq!(
            prepare_read_query("SELECT * FROM t", DEFAULT_ROW_LIMIT).unwrap(),
            "SELECT * FROM t LIMIT 1000"
        );
    }

    #[test]
    fn test_existing_limit_kept() {
        assert_eq!(
            prepare_read_query("select id from t limit 5;", DEFAULT_ROW_LIMIT).unwrap(),
            "select id from t limit 5"
        );
    }

    #[test]
    fn test_trailing_semicolon_stripped_before_limit() {
        assert_eq!(
            prepare_read_query("  SELECT 1 ;  ", 10).unwrap(),
            "SELECT 1 LIMIT 10"
        );
    }

    #[test]
    fn test_limit_substring_is_not_a_limit() {
        assert_eq!(
            prepare_read_query("SELECT credit_limit FROM accounts", 50).unwrap(),
            "SELECT credit_limit FROM accounts LIMIT 50"
        );
    }

    #[test]
    fn test_trailing_line_comment_does_not_swallow_limit() {
        assert_eq!(
            prepare_read_query("SELECT * FROM t -- x", DEFAULT_ROW_LIMIT).unwrap(),
            "SELECT * FROM t -- x\nLIMIT 1000"
        );
        assert_eq!(
            prepare_read_query("SELECT * FROM big_table -- all rows", 1000).unwrap(),
            "SELECT * FROM big_table -- all rows\nLIMIT 1000"
        );
    }

    #[test]
    fn test_limit_inside_comment_is_not_a_limit() {
        assert_eq!(
            prepare_read_query("SELECT * FROM t -- no limit", 20).unwrap(),
            "SELECT * FROM t -- no limit\nLIMIT 20"
        );
        assert_eq!(
            prepare_read_query("SELECT * FROM t /* limit 5 */", 20).unwrap(),
            "SELECT * FROM t /* limit 5 */ LIMIT 20"
        );
    }

    #[test]
    fn test_comment_markers_inside_literals() {
        assert_eq!(
            prepare_read_query("SELECT '--', x FROM t LIMIT 5", 20).unwrap(),
            "SELECT '--', x FROM t LIMIT 5"
        );
        assert_eq!(
            prepare_read_query("SELECT 'it''s -- fine' AS s", 20).unwrap(),
            "SELECT 'it''s -- fine' AS s LIMIT 20"
        );
    }

    #[test]
    fn test_limit_inside_literal_is_not_a_limit() {
        assert_eq!(
            prepare_read_query("SELECT 'limit 5' AS s, \"limit\" FROM t", 20).unwrap(),
            "SELECT 'limit 5' AS s, \"limit\" FROM t LIMIT 20"
        );
    }

    #[test]
    fn test_line_comment_before_limit_keeps_it() {
        assert_eq!(
            prepare_read_query("SELECT * FROM t -- first page\nLIMIT 5", 20).unwrap(),
            "SELECT * FROM t -- first page\nLIMIT 5"
        );
    }

    #[test]
    fn test_keyword_in_subquery_rejected() {
        let err = ensure_read_only("SELECT * FROM (DELETE FROM t RETURNING *) x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClassificationRejected);
        assert!(err.to_string().contains("delete"));
    }

    #[test]
    fn test_keyword_substring_allowed() {
        assert!(ensure_read_only("SELECT updated_at, created_by, dropped FROM t").is_ok());
    }

    #[test]
    fn test_must_start_with_select() {
        let err = ensure_read_only("SHOW search_path").unwrap_err();
        assert!(err.to_string().contains("must start with SELECT"));
        assert!(ensure_read_only("selection FROM t").is_err());
    }

    #[test]
    fn test_case_insensitive() {
        assert!(ensure_read_only("select 1; dRoP table t").is_err());
        assert!(ensure_read_only("SELECT 1 /* VaCuUm */").is_err());
    }

    #[test]
    fn test_database_lifecycle() {
        assert!(is_database_lifecycle("CREATE DATABASE foo"));
        assert!(is_database_lifecycle("drop\n  database if exists foo"));
        assert!(!is_database_lifecycle("CREATE TABLE database_log (id int)"));
        assert!(!is_database_lifecycle("DROP TABLE foo"));
    }
}
