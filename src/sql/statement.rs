//! Statements and the two-lane statement builder.
//!
//! SQL text reaches a [`Statement`] through exactly three lanes:
//! - `sql`: `&'static str` keywords and punctuation written in this crate,
//! - `ident`/`qualified`: validated [`Identifier`]s, always quoted,
//! - `param`: caller data, rendered as a `$n` placeholder and bound.
//!
//! A fourth lane, `fragment`, carries caller-supplied SQL text verbatim. It is
//! only reachable through [`TrustedFragment`], which the catalog creates for
//! dangerous operations that are documented to accept raw SQL.

use crate::error::{GatewayError, GatewayResult};
use crate::sql::identifier::Identifier;

/// A value bound to a `$n` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// A typed SQL NULL (text).
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Wire protocol used to send a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Simple query: no parameters, may contain several statements.
    Simple,
    /// Extended query: prepared, exactly one statement, parameters bound.
    Extended,
}

/// SQL text plus its ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<SqlParam>,
    single: bool,
}

impl Statement {
    /// A fixed statement with no parameters.
    pub fn fixed(sql: &'static str) -> Self {
        Self {
            sql: sql.to_string(),
            params: Vec::new(),
            single: false,
        }
    }

    /// A fixed statement with bound parameters (`$1`, `$2`, ... in `sql`).
    pub fn with_params(sql: &'static str, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.to_string(),
            params,
            single: false,
        }
    }

    /// Caller SQL that passed the safety classifier.
    ///
    /// Always sent over the extended protocol, so stacked statements are
    /// rejected by the server.
    pub fn ad_hoc(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            single: true,
        }
    }

    /// Caller SQL for arbitrary execution. May contain several statements.
    pub fn script(fragment: TrustedFragment) -> Self {
        Self {
            sql: fragment.0,
            params: Vec::new(),
            single: false,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    pub fn protocol(&self) -> Protocol {
        if self.single || !self.params.is_empty() {
            Protocol::Extended
        } else {
            Protocol::Simple
        }
    }
}

/// Caller-supplied SQL text passed through unmodified.
///
/// Only dangerous operations accept fragments (column definitions,
/// alterations, SET/WHERE bodies, value lists, index expressions), and those
/// operations are gated by the policy flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedFragment(String);

impl TrustedFragment {
    pub fn new(argument: &str, text: &str) -> GatewayResult<Self> {
        if text.trim().is_empty() {
            return Err(GatewayError::invalid_argument(format!(
                "{argument} must not be empty"
            )));
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Incremental builder for [`Statement`]s.
#[derive(Debug, Default)]
pub struct StatementBuilder {
    sql: String,
    params: Vec<SqlParam>,
}

impl StatementBuilder {
    pub fn new(head: &'static str) -> Self {
        Self {
            sql: head.to_string(),
            params: Vec::new(),
        }
    }

    /// Append fixed SQL text.
    pub fn sql(mut self, text: &'static str) -> Self {
        self.sql.push_str(text);
        self
    }

    /// Append fixed SQL text when `cond` holds.
    pub fn sql_if(self, cond: bool, text: &'static str) -> Self {
        if cond { self.sql(text) } else { self }
    }

    /// Append allow-listed keywords joined by `separator`.
    pub fn keywords(mut self, words: &[&'static str], separator: &'static str) -> Self {
        self.sql.push_str(&words.join(separator));
        self
    }

    /// Append a quoted identifier.
    pub fn ident(mut self, id: &Identifier) -> Self {
        self.sql.push_str(&id.quoted());
        self
    }

    /// Append `"schema"."name"`.
    pub fn qualified(self, schema: &Identifier, name: &Identifier) -> Self {
        self.ident(schema).sql(".").ident(name)
    }

    /// Append a trusted raw fragment verbatim.
    pub fn fragment(mut self, fragment: &TrustedFragment) -> Self {
        self.sql.push_str(fragment.as_str());
        self
    }

    /// Bind a value and append its placeholder.
    pub fn param(mut self, value: impl Into<SqlParam>) -> Self {
        self.params.push(value.into());
        self.sql.push_str(&format!("${}", self.params.len()));
        self
    }

    pub fn build(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
            single: false,
        }
    }
}
