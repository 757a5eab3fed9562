//! Operation dispatch.
//!
//! [`Gateway::invoke`] is the single path every operation takes:
//! find the descriptor, validate arguments, consult the policy for dangerous
//! operations, build the plan, execute it on the pool and shape the outcome.
//! Nothing escapes as an error; failures become [`ExecutionResult::Error`].

use crate::db::{ConnectionPool, ExecutionMode, Fetch, Outcome};
use crate::error::{GatewayError, GatewayResult};
use crate::models::{ExecutionResult, NO_ROWS_NOTICE};
use crate::policy::Policy;
use crate::sql::{Identifier, Statement, StatementBuilder};
use crate::tools::format::{self, OutputFormat};
use crate::tools::plan::{Plan, RenderReport, Shape, SignalAction};
use crate::tools::{self, CatalogContext, OperationDescriptor};
use serde_json::{Map, Value as JsonValue};
use std::time::Instant;
use tracing::{debug, info, warn};

pub type JsonObject = Map<String, JsonValue>;

/// Shared entry point for all operations. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct Gateway {
    pool: ConnectionPool,
    policy: Policy,
    context: CatalogContext,
}

impl Gateway {
    pub fn new(pool: ConnectionPool, policy: Policy, context: CatalogContext) -> Self {
        Self {
            pool,
            policy,
            context,
        }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Run the operation called `name`.
    pub async fn invoke(&self, name: &str, input: Option<&JsonObject>) -> ExecutionResult {
        match tools::find(name) {
            Some(op) => self.dispatch(op, input).await,
            None => GatewayError::invalid_argument(format!("unknown operation '{name}'")).into(),
        }
    }

    pub async fn dispatch(
        &self,
        op: &'static OperationDescriptor,
        input: Option<&JsonObject>,
    ) -> ExecutionResult {
        let start = Instant::now();
        match self.try_dispatch(op, input).await {
            Ok(result) => {
                info!(
                    operation = op.name,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Operation completed"
                );
                result
            }
            Err(e) => {
                warn!(
                    operation = op.name,
                    kind = ?e.kind(),
                    error = %e,
                    "Operation failed"
                );
                e.into()
            }
        }
    }

    async fn try_dispatch(
        &self,
        op: &'static OperationDescriptor,
        input: Option<&JsonObject>,
    ) -> GatewayResult<ExecutionResult> {
        let args = op.parse_args(input)?;
        if op.dangerous {
            self.policy.require_dangerous(op.name)?;
        }

        let plan = (op.build)(&args, &self.context)?;
        if !op.dangerous && plan.mode() != ExecutionMode::ReadOnly {
            return Err(GatewayError::internal(format!(
                "{} is not dangerous but built a {:?} plan",
                op.name,
                plan.mode()
            )));
        }

        debug!(operation = op.name, mode = ?plan.mode(), "Executing plan");
        self.execute(plan).await
    }

    async fn execute(&self, plan: Plan) -> GatewayResult<ExecutionResult> {
        match plan {
            Plan::Run {
                statement,
                mode,
                shape,
            } => {
                let fetch = match shape {
                    Shape::Status => Fetch::RowsAffected,
                    _ => Fetch::Rows,
                };
                let outcome = self.pool.run(&statement, mode, fetch).await?;
                Ok(shape_outcome(&shape, mode, outcome))
            }
            Plan::Render { render, report } => {
                let mut conn = self.pool.checkout().await?;
                let outcome = conn.run_rendered(&render).await;
                conn.release();
                let outcome = outcome?;
                Ok(match report {
                    RenderReport::Status => ExecutionResult::executed(outcome.rows_affected),
                    RenderReport::AnalyzedSchema(schema) => ExecutionResult::status(format!(
                        "OK: analyzed {} tables in schema {schema}",
                        outcome.statements
                    )),
                })
            }
            Plan::Dump { schema, table } => self.dump_table(&schema, &table).await,
        }
    }

    /// Column definitions and rows on one connection, rendered as SQL.
    async fn dump_table(
        &self,
        schema: &Identifier,
        table: &Identifier,
    ) -> GatewayResult<ExecutionResult> {
        let describe = Statement::with_params(
            tools::schema::DESCRIBE_TABLE,
            vec![schema.as_str().into(), table.as_str().into()],
        );
        let select = StatementBuilder::new("SELECT * FROM ")
            .qualified(schema, table)
            .build();

        let mut conn = self.pool.checkout().await?;
        let definition = conn
            .run(&describe, ExecutionMode::ReadOnly, Fetch::Rows)
            .await;
        let data = match &definition {
            Ok(_) => Some(conn.run(&select, ExecutionMode::ReadOnly, Fetch::Rows).await),
            Err(_) => None,
        };
        conn.release();

        let definition = definition?;
        let data = data.transpose()?.unwrap_or_default();
        Ok(ExecutionResult::text(format::dump_table(
            schema.as_str(),
            table.as_str(),
            &definition.rows,
            &data.rows,
        )))
    }
}

/// Turn a statement outcome into the result the operation promises.
fn shape_outcome(shape: &Shape, mode: ExecutionMode, outcome: Outcome) -> ExecutionResult {
    match shape {
        Shape::Rows => ExecutionResult::rows(outcome.rows),
        Shape::Row => ExecutionResult::scalar(outcome.rows),
        Shape::Status if mode == ExecutionMode::Autocommit => {
            ExecutionResult::status("OK: executed successfully")
        }
        Shape::Status => ExecutionResult::executed(outcome.rows_affected),
        Shape::Signal { action, pid } => signal_status(*action, *pid, &outcome),
        Shape::Csv if outcome.rows.is_empty() => ExecutionResult::text("No data found"),
        Shape::Csv => ExecutionResult::text(format::format_as_csv(&outcome.columns, &outcome.rows)),
        Shape::Query(OutputFormat::Json) if outcome.rows.is_empty() => {
            ExecutionResult::RowSet {
                rows: Vec::new(),
                row_count: 0,
                notice: Some(NO_ROWS_NOTICE.to_string()),
            }
        }
        Shape::Query(OutputFormat::Json) => ExecutionResult::rows(outcome.rows),
        Shape::Query(OutputFormat::Table) => ExecutionResult::text(format::format_as_table(
            &outcome.columns,
            &outcome.rows,
            outcome.elapsed_ms,
        )),
        Shape::Query(OutputFormat::Markdown) => {
            ExecutionResult::text(format::format_as_markdown(&outcome.columns, &outcome.rows))
        }
    }
}

/// A backend that already exited is reported, not treated as a failure.
fn signal_status(action: SignalAction, pid: i64, outcome: &Outcome) -> ExecutionResult {
    let signalled = outcome
        .rows
        .first()
        .and_then(|row| row.values().next())
        .and_then(JsonValue::as_bool)
        .unwrap_or(false);
    if signalled {
        ExecutionResult::status(format!("OK: {} query with PID {pid}", action.past_tense()))
    } else {
        ExecutionResult::status(format!(
            "could not {} query with PID {pid}; the backend may have already finished",
            action.verb()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcome(rows: Vec<JsonValue>) -> Outcome {
        let rows: Vec<_> = rows
            .into_iter()
            .filter_map(|r| r.as_object().cloned())
            .collect();
        let columns = rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        Outcome {
            columns,
            rows,
            rows_affected: 0,
            statements: 1,
            elapsed_ms: 2,
        }
    }

    #[test]
    fn test_signal_status() {
        let done = signal_status(
            SignalAction::Terminate,
            77,
            &outcome(vec![json!({"terminated": true})]),
        );
        assert_eq!(done, ExecutionResult::status("OK: terminated query with PID 77"));

        let gone = signal_status(
            SignalAction::Cancel,
            77,
            &outcome(vec![json!({"cancelled": false})]),
        );
        assert!(!gone.is_error());
        assert_eq!(
            gone,
            ExecutionResult::status(
                "could not cancel query with PID 77; the backend may have already finished"
            )
        );
    }

    #[test]
    fn test_status_by_mode() {
        let mut done = outcome(Vec::new());
        done.rows_affected = 4;
        assert_eq!(
            shape_outcome(&Shape::Status, ExecutionMode::Transactional, done.clone()),
            ExecutionResult::executed(4)
        );
        assert_eq!(
            shape_outcome(&Shape::Status, ExecutionMode::Autocommit, done),
            ExecutionResult::status("OK: executed successfully")
        );
    }

    #[test]
    fn test_empty_shapes() {
        assert_eq!(
            shape_outcome(&Shape::Csv, ExecutionMode::ReadOnly, outcome(Vec::new())),
            ExecutionResult::text("No data found")
        );
        assert_eq!(
            shape_outcome(&Shape::Row, ExecutionMode::ReadOnly, outcome(Vec::new())),
            ExecutionResult::Scalar { row: Map::new() }
        );
        let ExecutionResult::RowSet { notice, .. } = shape_outcome(
            &Shape::Query(OutputFormat::Json),
            ExecutionMode::ReadOnly,
            outcome(Vec::new()),
        ) else {
            panic!("expected a row set");
        };
        assert_eq!(notice.as_deref(), Some(NO_ROWS_NOTICE));
    }

    #[test]
    fn test_csv_shape() {
        let result = shape_outcome(
            &Shape::Csv,
            ExecutionMode::ReadOnly,
            outcome(vec![json!({"id": 1, "name": "a,b"})]),
        );
        assert_eq!(result, ExecutionResult::text("id,name\r\n1,\"a,b\"\r\n"));
    }
}
