//! Shared helpers for integration tests.

#![allow(dead_code)]

use pg_admin_mcp::db::{ConnectionPool, PoolSettings};
use pg_admin_mcp::tools::{ArgSpec, CatalogContext, args::ArgKind};
use pg_admin_mcp::{Gateway, Policy};
use serde_json::{Map, Value as JsonValue, json};
use sqlx::postgres::PgConnectOptions;
use std::sync::Arc;
use std::time::Duration;

/// Gateway over a pool that never connects until something checks out.
pub fn offline_gateway(policy: Policy) -> Arc<Gateway> {
    let settings = PoolSettings {
        min_size: 0,
        checkout_timeout: Duration::from_secs(1),
        ..PoolSettings::default()
    };
    let options = PgConnectOptions::new()
        .host("127.0.0.1")
        .port(1)
        .database("gateway_test");
    let pool = ConnectionPool::connect_lazy(options, &settings);
    Arc::new(Gateway::new(pool, policy, CatalogContext::new("gateway_test")))
}

/// Well-typed values for every required argument of an operation.
pub fn sample_args(specs: &[ArgSpec]) -> Map<String, JsonValue> {
    specs
        .iter()
        .filter(|spec| spec.is_required())
        .map(|spec| {
            let value = match spec.kind {
                ArgKind::Identifier => json!("sample"),
                ArgKind::Text => json!("SELECT"),
                ArgKind::Fragment => json!("id = 1"),
                ArgKind::Secret => json!("pw"),
                ArgKind::Bool => json!(true),
                ArgKind::Int => json!(1),
            };
            (spec.name.to_string(), value)
        })
        .collect()
}
