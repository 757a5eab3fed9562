//! pg-admin-mcp library.
//!
//! A policy-gated PostgreSQL administration gateway. Each administrative
//! operation is a static descriptor in [`tools`]; [`gateway::Gateway`]
//! validates arguments, applies the [`policy::Policy`], builds the statement
//! and runs it on the bounded [`db::ConnectionPool`]. The [`mcp`] and
//! [`transport`] modules publish the catalog as MCP tools.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod mcp;
pub mod models;
pub mod policy;
pub mod sql;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{ErrorKind, GatewayError, GatewayResult};
pub use gateway::Gateway;
pub use mcp::GatewayService;
pub use models::ExecutionResult;
pub use policy::Policy;
