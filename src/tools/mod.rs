//! Operation catalog.
//!
//! Every administrative operation is a static [`OperationDescriptor`]: its
//! name, argument specs, danger flag, declared execution mode and a builder
//! that turns validated arguments into a [`Plan`]. The gateway consumes this
//! table through one dispatch routine; nothing here touches the pool.
//!
//! - `schema`: listings and introspection
//! - `monitoring`: activity, locks and statistics
//! - `ddl`: databases, schemas, tables and indexes
//! - `roles`: users and privileges
//! - `maintenance`: session control, vacuum and analyze
//! - `write`: data manipulation and arbitrary execution
//! - `query`: classifier-gated ad-hoc reads and EXPLAIN
//! - `export`: CSV export and SQL dumps

pub mod args;
pub mod ddl;
pub mod export;
pub mod format;
pub mod maintenance;
pub mod monitoring;
pub mod plan;
pub mod query;
pub mod roles;
pub mod schema;
pub mod write;

pub use args::{ArgSpec, Args};
pub use format::OutputFormat;
pub use plan::{Plan, RenderReport, Shape, SignalAction};

use crate::db::ExecutionMode;
use crate::error::GatewayResult;
use serde_json::{Map, Value as JsonValue, json};

/// Facts about the server connection that some builders need.
#[derive(Debug, Clone, Default)]
pub struct CatalogContext {
    /// Database named in the connection configuration.
    pub database: String,
}

impl CatalogContext {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
        }
    }
}

pub type Builder = fn(&Args, &CatalogContext) -> GatewayResult<Plan>;

/// Static metadata for one operation. Immutable.
#[derive(Debug, Clone, Copy)]
pub struct OperationDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub args: &'static [ArgSpec],
    pub dangerous: bool,
    /// Mode the operation normally runs in. Arbitrary execution may switch
    /// to autocommit for database lifecycle statements.
    pub mode: ExecutionMode,
    pub build: Builder,
}

impl OperationDescriptor {
    /// A non-dangerous operation, always run in a read-only transaction.
    pub const fn read(
        name: &'static str,
        description: &'static str,
        args: &'static [ArgSpec],
        build: Builder,
    ) -> Self {
        Self {
            name,
            description,
            args,
            dangerous: false,
            mode: ExecutionMode::ReadOnly,
            build,
        }
    }

    /// A policy-gated operation.
    pub const fn dangerous(
        name: &'static str,
        description: &'static str,
        args: &'static [ArgSpec],
        mode: ExecutionMode,
        build: Builder,
    ) -> Self {
        Self {
            name,
            description,
            args,
            dangerous: true,
            mode,
            build,
        }
    }

    /// Tool description as published to clients.
    pub fn full_description(&self) -> String {
        if self.dangerous {
            format!(
                "{}\nDANGEROUS: requires ENABLE_DANGEROUS=true in the server environment.",
                self.description
            )
        } else {
            self.description.to_string()
        }
    }

    /// JSON schema for the operation's arguments.
    pub fn input_schema(&self) -> Map<String, JsonValue> {
        let properties: Map<String, JsonValue> = self
            .args
            .iter()
            .map(|spec| (spec.name.to_string(), spec.schema()))
            .collect();
        let required: Vec<&str> = self
            .args
            .iter()
            .filter(|spec| spec.is_required())
            .map(|spec| spec.name)
            .collect();

        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), JsonValue::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), json!(required));
        }
        schema.insert("additionalProperties".into(), json!(false));
        schema
    }

    pub fn parse_args(&self, input: Option<&Map<String, JsonValue>>) -> GatewayResult<Args> {
        Args::parse(self.args, input)
    }
}

static GROUPS: &[&[OperationDescriptor]] = &[
    schema::OPERATIONS,
    monitoring::OPERATIONS,
    ddl::OPERATIONS,
    roles::OPERATIONS,
    maintenance::OPERATIONS,
    write::OPERATIONS,
    query::OPERATIONS,
    export::OPERATIONS,
];

/// Every operation, in publication order.
pub fn operations() -> impl Iterator<Item = &'static OperationDescriptor> {
    GROUPS.iter().flat_map(|group| group.iter())
}

pub fn find(name: &str) -> Option<&'static OperationDescriptor> {
    operations().find(|op| op.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let mut seen = HashSet::new();
        for op in operations() {
            assert!(seen.insert(op.name), "duplicate operation {}", op.name);
            assert!(op.name.starts_with("pg_"));
        }
        assert_eq!(seen.len(), 62);
    }

    #[test]
    fn test_read_operations_run_read_only() {
        for op in operations().filter(|op| !op.dangerous) {
            assert_eq!(op.mode, ExecutionMode::ReadOnly, "{}", op.name);
        }
    }

    #[test]
    fn test_fragments_only_in_dangerous_operations() {
        for op in operations().filter(|op| !op.dangerous) {
            for spec in op.args {
                assert_ne!(spec.kind, args::ArgKind::Fragment, "{}.{}", op.name, spec.name);
            }
        }
    }

    #[test]
    fn test_autocommit_operations() {
        let autocommit: Vec<&str> = operations()
            .filter(|op| op.mode == ExecutionMode::Autocommit)
            .map(|op| op.name)
            .collect();
        assert_eq!(
            autocommit,
            vec!["pg_create_database", "pg_drop_database", "pg_vacuum_table"]
        );
    }

    #[test]
    fn test_input_schema() {
        let op = find("pg_delete_data").unwrap();
        let schema = op.input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["required"], json!(["schema", "table", "where_clause"]));
        assert!(op.full_description().contains("ENABLE_DANGEROUS=true"));

        let health = find("pg_health").unwrap().input_schema();
        assert!(!health.contains_key("required"));
        assert_eq!(health["properties"], json!({}));
    }

    #[test]
    fn test_find_unknown() {
        assert!(find("pg_nope").is_none());
        assert!(find("pg_query").is_some());
    }
}
