//! Operation results as returned to callers.

use crate::db::JsonRow;
use crate::error::{ErrorKind, GatewayError};
use serde::Serialize;

/// Notice attached to an ad-hoc query that matched nothing.
pub const NO_ROWS_NOTICE: &str = "Query executed successfully but returned no rows";

/// Outcome of one operation. Failures are values, never panics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionResult {
    /// Ordered rows, possibly empty.
    RowSet {
        rows: Vec<JsonRow>,
        row_count: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        notice: Option<String>,
    },
    /// A single mapping; empty when the statement matched no row.
    Scalar { row: JsonRow },
    Status {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        rows_affected: Option<u64>,
    },
    /// Rendered text: CSV, SQL dumps and formatted tables.
    Text { text: String },
    Error { error: OperationError },
}

impl ExecutionResult {
    pub fn rows(rows: Vec<JsonRow>) -> Self {
        Self::RowSet {
            row_count: rows.len(),
            rows,
            notice: None,
        }
    }

    /// First row of `rows`, or an empty mapping.
    pub fn scalar(rows: Vec<JsonRow>) -> Self {
        Self::Scalar {
            row: rows.into_iter().next().unwrap_or_default(),
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
            rows_affected: None,
        }
    }

    /// "OK: executed successfully, rows affected: N"
    pub fn executed(rows_affected: u64) -> Self {
        Self::Status {
            message: format!("OK: executed successfully, rows affected: {rows_affected}"),
            rows_affected: Some(rows_affected),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Error { error } => Some(error.kind),
            _ => None,
        }
    }
}

/// Structured failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<&GatewayError> for OperationError {
    fn from(err: &GatewayError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            sql_state: err.sql_state().map(str::to_string),
            hint: err.hint().map(str::to_string),
        }
    }
}

impl From<GatewayError> for ExecutionResult {
    fn from(err: GatewayError) -> Self {
        Self::Error {
            error: OperationError::from(&err),
        }
    }
}
