//! MCP server integration module.
//!
//! Publishes the operation catalog through the rmcp framework.

pub mod service;

pub use service::GatewayService;
