//! Data manipulation and arbitrary execution.
//!
//! These operations take raw SQL fragments. The fragments are passed through
//! verbatim, which is why every operation here is dangerous.

use crate::db::ExecutionMode;
use crate::error::GatewayResult;
use crate::sql::classifier::is_database_lifecycle;
use crate::sql::{Statement, StatementBuilder};
use crate::tools::args::{ArgSpec, Args};
use crate::tools::plan::{Plan, Shape};
use crate::tools::{CatalogContext, OperationDescriptor};

const SCHEMA: ArgSpec = ArgSpec::ident("schema", "Schema name");
const TABLE: ArgSpec = ArgSpec::ident("table", "Table name");

pub(crate) static OPERATIONS: &[OperationDescriptor] = &[
    OperationDescriptor::dangerous(
        "pg_insert_data",
        "Insert a row.\n\
         Example: columns \"name, email\", values \"'John Doe', 'john@example.com'\".",
        &[
            SCHEMA,
            TABLE,
            ArgSpec::fragment("columns", "Comma-separated column list"),
            ArgSpec::fragment("values", "Comma-separated SQL value expressions"),
        ],
        ExecutionMode::Transactional,
        insert_data,
    ),
    OperationDescriptor::dangerous(
        "pg_update_data",
        "Update rows.\n\
         Example: set_clause \"status = 'active', updated_at = now()\", where_clause \"id = 123\".\n\
         Without where_clause every row is updated.",
        &[
            SCHEMA,
            TABLE,
            ArgSpec::fragment("set_clause", "Body of the SET clause"),
            ArgSpec::fragment("where_clause", "Body of the WHERE clause").optional(),
        ],
        ExecutionMode::Transactional,
        update_data,
    ),
    OperationDescriptor::dangerous(
        "pg_delete_data",
        "Delete rows matching where_clause. Use pg_truncate_table to delete all rows.",
        &[
            SCHEMA,
            TABLE,
            ArgSpec::fragment("where_clause", "Body of the WHERE clause")
                .with_hint("use pg_truncate_table to delete all rows"),
        ],
        ExecutionMode::Transactional,
        delete_data,
    ),
    OperationDescriptor::dangerous(
        "pg_execute_sql",
        "Execute arbitrary SQL. CREATE DATABASE and DROP DATABASE run outside a transaction; \
         everything else runs in one transaction.\n\
         Prefer the specific operations when one exists.",
        &[ArgSpec::fragment("sql", "SQL to execute")],
        ExecutionMode::Transactional,
        execute_sql,
    ),
];

fn insert_data(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let statement = StatementBuilder::new("INSERT INTO ")
        .qualified(args.ident("schema")?, args.ident("table")?)
        .sql(" (")
        .fragment(args.fragment("columns")?)
        .sql(") VALUES (")
        .fragment(args.fragment("values")?)
        .sql(")")
        .build();
    Ok(Plan::transactional(statement))
}

fn update_data(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let mut statement = StatementBuilder::new("UPDATE ")
        .qualified(args.ident("schema")?, args.ident("table")?)
        .sql(" SET ")
        .fragment(args.fragment("set_clause")?);
    if let Some(filter) = args.opt_fragment("where_clause") {
        statement = statement.sql(" WHERE ").fragment(filter);
    }
    Ok(Plan::transactional(statement.build()))
}

fn delete_data(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let statement = StatementBuilder::new("DELETE FROM ")
        .qualified(args.ident("schema")?, args.ident("table")?)
        .sql(" WHERE ")
        .fragment(args.fragment("where_clause")?)
        .build();
    Ok(Plan::transactional(statement))
}

fn execute_sql(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let fragment = args.fragment("sql")?.clone();
    let mode = if is_database_lifecycle(fragment.as_str()) {
        ExecutionMode::Autocommit
    } else {
        ExecutionMode::Transactional
    };
    Ok(Plan::run(Statement::script(fragment), mode, Shape::Status))
}
