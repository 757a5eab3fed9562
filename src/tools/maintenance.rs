//! Session control, vacuum and analyze.

use crate::db::ExecutionMode;
use crate::error::GatewayResult;
use crate::sql::{Statement, StatementBuilder};
use crate::tools::args::{ArgSpec, Args};
use crate::tools::plan::{Plan, RenderReport, Shape, SignalAction};
use crate::tools::{CatalogContext, OperationDescriptor};

const PID: ArgSpec = ArgSpec::int("pid", "Backend process id (see pg_active_queries)");

pub(crate) static OPERATIONS: &[OperationDescriptor] = &[
    OperationDescriptor::dangerous(
        "pg_kill_query",
        "Terminate a backend by its PID.",
        &[PID],
        ExecutionMode::Transactional,
        kill_query,
    ),
    OperationDescriptor::dangerous(
        "pg_cancel_query",
        "Cancel the running query of a backend by its PID. Gentler than pg_kill_query.",
        &[PID],
        ExecutionMode::Transactional,
        cancel_query,
    ),
    OperationDescriptor::dangerous(
        "pg_vacuum_table",
        "Vacuum a table to reclaim space and update statistics.\n\
         Set full=true for VACUUM FULL (takes an exclusive lock, reclaims more space).",
        &[
            ArgSpec::ident("schema", "Schema name"),
            ArgSpec::ident("table", "Table name"),
            ArgSpec::flag("full", false, "Run VACUUM FULL"),
            ArgSpec::flag("analyze", true, "Also update planner statistics"),
        ],
        ExecutionMode::Autocommit,
        vacuum_table,
    ),
    OperationDescriptor::dangerous(
        "pg_analyze_table",
        "Update planner statistics for one table, or for every table of the schema when \
         table is omitted.",
        &[
            ArgSpec::ident("schema", "Schema name"),
            ArgSpec::ident("table", "Table name; omit to analyze the whole schema").optional(),
        ],
        ExecutionMode::Transactional,
        analyze_table,
    ),
];

const TERMINATE_BACKEND: &str = "SELECT pg_terminate_backend($1::int) AS terminated";
const CANCEL_BACKEND: &str = "SELECT pg_cancel_backend($1::int) AS cancelled";

fn signal(args: &Args, action: SignalAction, sql: &'static str) -> GatewayResult<Plan> {
    let pid = args.positive_int("pid")?;
    Ok(Plan::run(
        Statement::with_params(sql, vec![pid.into()]),
        ExecutionMode::Transactional,
        Shape::Signal { action, pid },
    ))
}

fn kill_query(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    signal(args, SignalAction::Terminate, TERMINATE_BACKEND)
}

fn cancel_query(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    signal(args, SignalAction::Cancel, CANCEL_BACKEND)
}

fn vacuum_table(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let statement = StatementBuilder::new("VACUUM ")
        .sql_if(args.flag("full"), "FULL ")
        .sql_if(args.flag("analyze"), "ANALYZE ")
        .qualified(args.ident("schema")?, args.ident("table")?)
        .build();
    Ok(Plan::autocommit(statement))
}

fn analyze_table(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let schema = args.ident("schema")?;
    match args.opt_ident("table") {
        Some(table) => Ok(Plan::transactional(
            StatementBuilder::new("ANALYZE ")
                .qualified(schema, table)
                .build(),
        )),
        None => {
            let render = StatementBuilder::new(
                "SELECT format('ANALYZE %I.%I', schemaname, tablename) AS statement \
                 FROM pg_tables WHERE schemaname = ",
            )
            .param(schema.as_str())
            .sql(" ORDER BY tablename")
            .build();
            Ok(Plan::Render {
                render,
                report: RenderReport::AnalyzedSchema(schema.clone()),
            })
        }
    }
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
    fn test_kill_binds_pid() {
        let plan = build("pg_kill_query", json!({"pid": 4242})).unwrap();
        let Plan::Run {
            statement, shape, ..
        } = &plan
        else {
            panic!("expected a run plan");
        };
        assert_eq!(statement.sql(), TERMINATE_BACKEND);
        assert_eq!(statement.params(), &[SqlParam::Int(4242)]);
        assert_eq!(
            shape,
            &Shape::Signal {
                action: SignalAction::Terminate,
                pid: 4242
            }
        );
    }

    #[test]
    fn test_cancel_rejects_bad_pid() {
        let err = build("pg_cancel_query", json!({"pid": 0})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = build("pg_cancel_query", json!({"pid": "abc"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_vacuum_clauses() {
        let plan = build("pg_vacuum_table", json!({"schema": "public", "table": "t"})).unwrap();
        assert_eq!(plan.statement().unwrap().sql(), "VACUUM ANALYZE \"public\".\"t\"");
        assert_eq!(plan.mode(), ExecutionMode::Autocommit);

        let plan = build(
            "pg_vacuum_table",
            json!({"schema": "public", "table": "t", "full": true, "analyze": false}),
        )
        .unwrap();
        assert_eq!(plan.statement().unwrap().sql(), "VACUUM FULL \"public\".\"t\"");
    }

    #[test]
    fn test_analyze_single_table() {
        let plan = build("pg_analyze_table", json!({"schema": "s", "table": "t"})).unwrap();
        assert_eq!(plan.statement().unwrap().sql(), "ANALYZE \"s\".\"t\"");
        assert_eq!(plan.mode(), ExecutionMode::Transactional);
    }

    #[test]
    fn test_analyze_whole_schema_renders() {
        let plan = build("pg_analyze_table", json!({"schema": "sales"})).unwrap();
        let Plan::Render { render, report } = &plan else {
            panic!("expected a render plan");
        };
        assert!(render.sql().contains("format('ANALYZE %I.%I'"));
        assert_eq!(render.params(), &[SqlParam::Text("sales".to_string())]);
        assert!(matches!(report, RenderReport::AnalyzedSchema(s) if s.as_str() == "sales"));
    }
}
