//! CSV export and SQL dumps. Read-only.

use crate::db::ExecutionMode;
use crate::error::GatewayResult;
use crate::sql::StatementBuilder;
use crate::tools::args::{ArgSpec, Args};
use crate::tools::plan::{Plan, Shape};
use crate::tools::{CatalogContext, OperationDescriptor};

const SCHEMA: ArgSpec = ArgSpec::ident("schema", "Schema name");
const TABLE: ArgSpec = ArgSpec::ident("table", "Table name");

pub(crate) static OPERATIONS: &[OperationDescriptor] = &[
    OperationDescriptor::read(
        "pg_export_table_csv",
        "Export table rows as CSV (header line first, at most limit rows).",
        &[
            SCHEMA,
            TABLE,
            ArgSpec::int("limit", "Maximum number of rows").default_int(10_000),
        ],
        export_table_csv,
    ),
    OperationDescriptor::read(
        "pg_backup_table_sql",
        "Generate a SQL dump of a table: CREATE TABLE from its column definitions followed \
         by one INSERT per row.",
        &[SCHEMA, TABLE],
        backup_table_sql,
    ),
];

fn export_table_csv(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let statement = StatementBuilder::new("SELECT * FROM ")
        .qualified(args.ident("schema")?, args.ident("table")?)
        .sql(" LIMIT ")
        .param(args.positive_int("limit")?)
        .build();
    Ok(Plan::run(statement, ExecutionMode::ReadOnly, Shape::Csv))
}

fn backup_table_sql(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    Ok(Plan::Dump {
        schema: args.ident("schema")?.clone(),
        table: args.ident("table")?.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sql::SqlParam;
    use crate::tools::find;
    use serde_json::json;

    fn build(name: &str, input: serde_json::Value) -> GatewayResult<Plan> {
        let op = find(name).unwrap();
        let args = op.parse_args(input.as_object())?;
        (op.build)(&args, &CatalogContext::default())
    }

    #[test]
    fn test_csv_export_statement() {
        let plan = build("pg_export_table_csv", json!({"schema": "public", "table": "t"})).unwrap();
        let statement = plan.statement().unwrap();
        assert_eq!(statement.sql(), "SELECT * FROM \"public\".\"t\" LIMIT $1");
        assert_eq!(statement.params(), &[SqlParam::Int(10_000)]);
    }

    #[test]
    fn test_csv_export_rejects_bad_table() {
        let err = build(
            "pg_export_table_csv",
            json!({"schema": "public", "table": "t; DROP TABLE x"}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);
    }

    #[test]
    fn test_backup_is_a_dump_plan() {
        let plan = build("pg_backup_table_sql", json!({"schema": "s", "table": "t"})).unwrap();
        assert!(matches!(
            &plan,
            Plan::Dump { schema, table } if schema.as_str() == "s" && table.as_str() == "t"
        ));
        assert_eq!(plan.mode(), ExecutionMode::ReadOnly);
    }
}
