//! Database access layer.
//!
//! - `pool`: the bounded connection pool, checkout gate and execution modes
//! - `params`: parameter binding
//! - `types`: row to JSON conversion

pub(crate) mod params;
pub mod pool;
pub mod types;

pub use pool::{
    CheckoutGate, ConnectionPool, ExecutionMode, Fetch, Outcome, PoolSettings, PoolStats,
    PooledConnection,
};
pub use types::{JsonRow, RowToJson};
