//! Data models returned by the gateway.

pub mod result;

pub use result::{ExecutionResult, NO_ROWS_NOTICE, OperationError};
