//! Error types for the gateway.
//!
//! Every failure inside an operation is converted into a [`GatewayError`] and
//! returned to the caller as data. The variants map one-to-one onto the
//! [`ErrorKind`] taxonomy that appears in results; `Connection` and `Internal`
//! only occur outside operations (startup and transport failures).

use serde::Serialize;
use thiserror::Error;

/// Error category reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    InvalidIdentifier,
    PolicyDenied,
    PoolExhausted,
    ExecutionFailed,
    ClassificationRejected,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        message: String,
        hint: Option<String>,
    },

    #[error("Invalid identifier for '{argument}': {value:?} must match ^[A-Za-z_][A-Za-z0-9_]*$")]
    InvalidIdentifier { argument: String, value: String },

    #[error(
        "Operation denied: {operation} is a dangerous operation and dangerous operations are disabled"
    )]
    PolicyDenied { operation: String },

    /// `waited_ms` is unknown when the driver timed out on its own.
    #[error("Connection pool exhausted: {}", describe_wait(.waited_ms))]
    PoolExhausted { waited_ms: Option<u64> },

    /// `message` is the engine's error text, unmodified.
    #[error("Execution failed: {message}")]
    ExecutionFailed {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Query rejected: {reason}")]
    ClassificationRejected { reason: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
            hint: None,
        }
    }

    /// Create an invalid argument error carrying a follow-up hint.
    pub fn invalid_argument_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn invalid_identifier(argument: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            argument: argument.into(),
            value: value.into(),
        }
    }

    pub fn policy_denied(operation: impl Into<String>) -> Self {
        Self::PolicyDenied {
            operation: operation.into(),
        }
    }

    pub fn pool_exhausted(waited_ms: u64) -> Self {
        Self::PoolExhausted {
            waited_ms: Some(waited_ms),
        }
    }

    pub fn execution_failed(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::ExecutionFailed {
            message: message.into(),
            sql_state,
        }
    }

    pub fn classification_rejected(reason: impl Into<String>) -> Self {
        Self::ClassificationRejected {
            reason: reason.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Category reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::InvalidIdentifier { .. } => ErrorKind::InvalidIdentifier,
            Self::PolicyDenied { .. } => ErrorKind::PolicyDenied,
            Self::PoolExhausted { .. } => ErrorKind::PoolExhausted,
            Self::ClassificationRejected { .. } => ErrorKind::ClassificationRejected,
            Self::ExecutionFailed { .. } | Self::Connection { .. } | Self::Internal { .. } => {
                ErrorKind::ExecutionFailed
            }
        }
    }

    /// Actionable follow-up for this error, if there is one.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::InvalidArgument { hint, .. } => hint.as_deref(),
            Self::PolicyDenied { .. } => Some(
                "Set ENABLE_DANGEROUS=true in the server environment and restart the server",
            ),
            Self::PoolExhausted { .. } => {
                Some("Retry later or raise MCP_POOL_MAX_SIZE / MCP_CHECKOUT_TIMEOUT")
            }
            Self::ClassificationRejected { .. } => {
                Some("Use the dedicated administrative operations for anything but SELECT")
            }
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// SQLSTATE reported by the engine, for execution failures.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::ExecutionFailed { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }
}

/// Convert sqlx errors to GatewayError.
impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => GatewayError::PoolExhausted { waited_ms: None },
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                GatewayError::execution_failed(db_err.message(), code)
            }
            sqlx::Error::PoolClosed => {
                GatewayError::execution_failed("Connection pool is closed", None)
            }
            sqlx::Error::Io(io_err) => {
                GatewayError::execution_failed(format!("I/O error: {}", io_err), None)
            }
            sqlx::Error::Tls(tls_err) => {
                GatewayError::execution_failed(format!("TLS error: {}", tls_err), None)
            }
            sqlx::Error::Protocol(msg) => {
                GatewayError::execution_failed(format!("Protocol error: {}", msg), None)
            }
            other => GatewayError::execution_failed(other.to_string(), None),
        }
    }
}

fn describe_wait(waited_ms: &Option<u64>) -> String {
    match waited_ms {
        Some(ms) => format!("no connection became available within {ms}ms"),
        None => "the driver timed out waiting for a connection".to_string(),
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
