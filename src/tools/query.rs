//! Ad-hoc reads and EXPLAIN.
//!
//! Neither operation is policy-gated. Both pass the caller's SQL through the
//! lexical classifier first and then run it in a read-only transaction over
//! the extended protocol, so stacked statements are refused by the server.

use crate::db::ExecutionMode;
use crate::error::{GatewayError, GatewayResult};
use crate::sql::Statement;
use crate::sql::classifier::{self, DEFAULT_ROW_LIMIT};
use crate::tools::args::{ArgSpec, Args};
use crate::tools::format::OutputFormat;
use crate::tools::plan::{Plan, Shape};
use crate::tools::{CatalogContext, OperationDescriptor};

/// Largest row cap a caller may request.
pub const MAX_ROW_LIMIT: i64 = 100_000;

pub(crate) static OPERATIONS: &[OperationDescriptor] = &[
    OperationDescriptor::read(
        "pg_query",
        "Run a read-only SELECT. Statements containing write or DDL keywords are refused; \
         use the specific operations instead.\n\
         A LIMIT of max_rows is appended when the query has none.",
        &[
            ArgSpec::text("sql", "SELECT statement"),
            ArgSpec::int("max_rows", "Row cap applied when the query has no LIMIT")
                .default_int(DEFAULT_ROW_LIMIT as i64),
            ArgSpec::text("format", "Output format: json, table or markdown").default_text("json"),
        ],
        query,
    ),
    OperationDescriptor::read(
        "pg_explain_query",
        "Show the execution plan of a statement as JSON.\n\
         analyze=true executes the statement (EXPLAIN ANALYZE) and is only allowed for reads.",
        &[
            ArgSpec::text("sql", "Statement to explain"),
            ArgSpec::flag("analyze", false, "Execute the statement and report actual timings"),
        ],
        explain_query,
    ),
];

fn query(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let requested = args.text("format")?;
    let format = OutputFormat::parse(requested).ok_or_else(|| {
        GatewayError::invalid_argument_with_hint(
            format!("unsupported format '{requested}'"),
            format!("choose one of: {}", OutputFormat::CHOICES.join(", ")),
        )
    })?;
    let max_rows = args.positive_int("max_rows")?;
    let max_rows = u32::try_from(max_rows)
        .ok()
        .filter(|rows| i64::from(*rows) <= MAX_ROW_LIMIT)
        .ok_or_else(|| {
            GatewayError::invalid_argument(format!("max_rows must not exceed {MAX_ROW_LIMIT}"))
        })?;
    let sql = classifier::prepare_read_query(args.text("sql")?, max_rows)?;
    Ok(Plan::run(
        Statement::ad_hoc(sql),
        ExecutionMode::ReadOnly,
        Shape::Query(format),
    ))
}

fn explain_query(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let sql = classifier::normalize(args.text("sql")?);
    let analyze = args.flag("analyze");
    if analyze {
        if let Some(keyword) = classifier::disallowed_keyword(sql) {
            return Err(GatewayError::classification_rejected(format!(
                "EXPLAIN ANALYZE executes the statement and cannot be used with '{keyword}'"
            )));
        }
    }
    let options = if analyze {
        "FORMAT JSON, ANALYZE, BUFFERS, VERBOSE"
    } else {
        "FORMAT JSON, VERBOSE"
    };
    Ok(Plan::rows(Statement::ad_hoc(format!(
        "EXPLAIN ({options}) {sql}"
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sql::Protocol;
    use crate::tools::find;
    use serde_json::json;

    fn build(name: &str, input: serde_json::Value) -> GatewayResult<Plan> {
        let op = find(name).unwrap();
        let args = op.parse_args(input.as_object())?;
        (op.build)(&args, &CatalogContext::default())
    }

    #[test]
    fn test_query_appends_limit() {
        let plan = build("pg_query", json!({"sql": "SELECT * FROM t;"})).unwrap();
        let statement = plan.statement().unwrap();
        assert_eq!(statement.sql(), "SELECT * FROM t LIMIT 1000");
        assert_eq!(statement.protocol(), Protocol::Extended);
        assert_eq!(plan.mode(), ExecutionMode::ReadOnly);
    }

    #[test]
    fn test_query_format_and_cap() {
        let plan = build(
            "pg_query",
            json!({"sql": "select 1", "max_rows": 5, "format": "Markdown"}),
        )
        .unwrap();
        assert_eq!(plan.statement().unwrap().sql(), "select 1 LIMIT 5");
        assert!(matches!(
            plan,
            Plan::Run {
                shape: Shape::Query(OutputFormat::Markdown),
                ..
            }
        ));

        let err = build("pg_query", json!({"sql": "select 1", "format": "xml"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = build("pg_query", json!({"sql": "select 1", "max_rows": 0})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_query_rejects_writes() {
        let err = build("pg_query", json!({"sql": "DELETE FROM t"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClassificationRejected);

        let err = build("pg_query", json!({"sql": "WITH x AS (SELECT 1) SELECT * FROM x"}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClassificationRejected);
    }

    #[test]
    fn test_explain_options() {
        let plan = build("pg_explain_query", json!({"sql": "SELECT 1"})).unwrap();
        assert_eq!(
            plan.statement().unwrap().sql(),
            "EXPLAIN (FORMAT JSON, VERBOSE) SELECT 1"
        );

        let plan = build("pg_explain_query", json!({"sql": "SELECT 1", "analyze": true})).unwrap();
        assert_eq!(
            plan.statement().unwrap().sql(),
            "EXPLAIN (FORMAT JSON, ANALYZE, BUFFERS, VERBOSE) SELECT 1"
        );
    }

    #[test]
    fn test_explain_analyze_refuses_writes() {
        let err = build(
            "pg_explain_query",
            json!({"sql": "DELETE FROM t", "analyze": true}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClassificationRejected);

        assert!(build("pg_explain_query", json!({"sql": "DELETE FROM t"})).is_ok());
    }
}
