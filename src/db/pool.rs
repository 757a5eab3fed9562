//! Connection pool management.
//!
//! `ConnectionPool` wraps a `PgPool` with a checkout gate: a semaphore sized to
//! `max_size` plus atomic bookkeeping. Every connection handed out is paired
//! with a gate permit, so at most `max_size` connections are ever checked out,
//! waiting callers give up with `PoolExhausted` after a bounded wait, and
//! both the permit and the connection go back when the guard is dropped.

use crate::db::params::bind_all;
use crate::db::types::{JsonRow, RowToJson};
use crate::error::{GatewayError, GatewayResult};
use crate::sql::{Protocol, Statement};
use futures_util::TryStreamExt;
use serde::Serialize;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPoolOptions, PgRow};
use sqlx::{Connection, Executor, PgPool, Postgres};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// How a statement is wrapped when it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// `BEGIN; SET TRANSACTION READ ONLY; ...; COMMIT`
    ReadOnly,
    /// `BEGIN; ...; COMMIT`, rolled back on any failure.
    Transactional,
    /// No transaction. Required for CREATE/DROP DATABASE and VACUUM.
    Autocommit,
}

/// What to collect from a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    Rows,
    RowsAffected,
}

/// Result of running one statement.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    /// Column names in SELECT order (empty when no rows came back).
    pub columns: Vec<String>,
    pub rows: Vec<JsonRow>,
    pub rows_affected: u64,
    /// Statements executed; greater than one only for rendered batches.
    pub statements: usize,
    pub elapsed_ms: u64,
}

impl Outcome {
    fn from_rows(rows: Vec<PgRow>) -> Self {
        let columns = rows.first().map(RowToJson::column_names).unwrap_or_default();
        Self {
            columns,
            rows: rows.iter().map(RowToJson::to_json_map).collect(),
            rows_affected: 0,
            statements: 1,
            elapsed_ms: 0,
        }
    }

    fn from_count(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            statements: 1,
            ..Self::default()
        }
    }
}

/// Pool sizing and timeouts.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub min_size: u32,
    pub max_size: u32,
    /// Longest a caller waits for a free connection.
    pub checkout_timeout: Duration,
    /// Longest startup waits for the first connection.
    pub connect_timeout: Duration,
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 5,
            checkout_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }
}

/// Snapshot of pool bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub max_size: usize,
    pub checked_out: usize,
    pub total_checkouts: u64,
}

// =============================================================================
// Checkout Gate
// =============================================================================

/// Bounds concurrent checkouts and counts them.
#[derive(Debug)]
pub struct CheckoutGate {
    permits: Arc<Semaphore>,
    max_size: usize,
    wait: Duration,
    checked_out: AtomicUsize,
    total_checkouts: AtomicU64,
}

impl CheckoutGate {
    pub fn new(max_size: u32, wait: Duration) -> Arc<Self> {
        let max_size = max_size.max(1) as usize;
        Arc::new(Self {
            permits: Arc::new(Semaphore::new(max_size)),
            max_size,
            wait,
            checked_out: AtomicUsize::new(0),
            total_checkouts: AtomicU64::new(0),
        })
    }

    /// Wait for a slot, failing with `PoolExhausted` after the configured wait.
    pub async fn enter(self: &Arc<Self>) -> GatewayResult<GatePermit> {
        let acquire = self.permits.clone().acquire_owned();
        let permit = match tokio::time::timeout(self.wait, acquire).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => {
                return Err(GatewayError::execution_failed(
                    "Connection pool is closed",
                    None,
                ));
            }
            Err(_elapsed) => {
                warn!(
                    max_size = self.max_size,
                    waited_ms = self.wait.as_millis() as u64,
                    "Connection checkout timed out"
                );
                return Err(GatewayError::pool_exhausted(self.wait.as_millis() as u64));
            }
        };

        self.checked_out.fetch_add(1, Ordering::SeqCst);
        self.total_checkouts.fetch_add(1, Ordering::SeqCst);
        Ok(GatePermit {
            gate: Arc::clone(self),
            _permit: permit,
        })
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            max_size: self.max_size,
            checked_out: self.checked_out.load(Ordering::SeqCst),
            total_checkouts: self.total_checkouts.load(Ordering::SeqCst),
        }
    }

    fn close(&self) {
        self.permits.close();
    }
}

/// One slot of the gate; returned when dropped.
#[derive(Debug)]
pub struct GatePermit {
    gate: Arc<CheckoutGate>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.checked_out.fetch_sub(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Connection Pool
// =============================================================================

#[derive(Debug, Clone)]
pub struct ConnectionPool {
    pool: PgPool,
    gate: Arc<CheckoutGate>,
}

impl ConnectionPool {
    /// Connect eagerly and verify the server answers.
    pub async fn connect(options: PgConnectOptions, settings: &PoolSettings) -> GatewayResult<Self> {
        info!(
            host = %options.get_host(),
            port = options.get_port(),
            database = ?options.get_database(),
            min_size = settings.min_size,
            max_size = settings.max_size,
            "Connecting to PostgreSQL"
        );

        let connect = pool_options(settings).connect_with(options);
        let pool = match tokio::time::timeout(settings.connect_timeout, connect).await {
            Ok(Ok(pool)) => pool,
            Ok(Err(e)) => {
                return Err(GatewayError::connection(
                    e.to_string(),
                    "Check PGHOST, PGPORT, PGDATABASE, PGUSER, PGPASSWORD and PGSSLMODE",
                ));
            }
            Err(_) => {
                return Err(GatewayError::connection(
                    format!(
                        "timed out after {}s",
                        settings.connect_timeout.as_secs()
                    ),
                    "Check that the server is reachable",
                ));
            }
        };

        let server_version: Option<String> = sqlx::query_scalar("SHOW server_version")
            .fetch_one(&pool)
            .await
            .ok();
        info!(server_version = ?server_version, "Connected successfully");

        Ok(Self::from_pool(pool, settings))
    }

    /// Build the pool without opening any connection.
    pub fn connect_lazy(options: PgConnectOptions, settings: &PoolSettings) -> Self {
        let pool = pool_options(settings).connect_lazy_with(options);
        Self::from_pool(pool, settings)
    }

    fn from_pool(pool: PgPool, settings: &PoolSettings) -> Self {
        Self {
            pool,
            gate: CheckoutGate::new(settings.max_size, settings.checkout_timeout),
        }
    }

    /// Check out a connection for exclusive use.
    ///
    /// Waiting for a gate slot and for the driver share one deadline of
    /// `checkout_timeout`.
    pub async fn checkout(&self) -> GatewayResult<PooledConnection> {
        let started = Instant::now();
        let permit = self.gate.enter().await?;
        let remaining = self.gate.wait.saturating_sub(started.elapsed());
        let conn = match tokio::time::timeout(remaining, self.pool.acquire()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(sqlx::Error::PoolTimedOut)) | Err(_) => {
                let waited_ms = started.elapsed().as_millis() as u64;
                warn!(waited_ms, "Driver connection acquire timed out");
                return Err(GatewayError::pool_exhausted(waited_ms));
            }
            Ok(Err(e)) => return Err(e.into()),
        };
        debug!(checked_out = self.gate.stats().checked_out, "Connection checked out");
        Ok(PooledConnection {
            conn,
            _permit: permit,
        })
    }

    /// Return a connection. Dropping the guard does the same.
    pub fn release(&self, conn: PooledConnection) {
        conn.release();
    }

    /// Check out, run one statement, release.
    pub async fn run(
        &self,
        statement: &Statement,
        mode: ExecutionMode,
        fetch: Fetch,
    ) -> GatewayResult<Outcome> {
        let mut conn = self.checkout().await?;
        let result = conn.run(statement, mode, fetch).await;
        conn.release();
        result
    }

    pub fn stats(&self) -> PoolStats {
        self.gate.stats()
    }

    pub async fn close(&self) {
        self.gate.close();
        self.pool.close().await;
        info!("Connection pool closed");
    }
}

fn pool_options(settings: &PoolSettings) -> PgPoolOptions {
    PgPoolOptions::new()
        .min_connections(settings.min_size)
        .max_connections(settings.max_size.max(1))
        // checkout() enforces the combined deadline; this bounds direct pool use.
        .acquire_timeout(settings.checkout_timeout)
        .idle_timeout(settings.idle_timeout)
        .test_before_acquire(true)
}

// =============================================================================
// Pooled Connection
// =============================================================================

/// A checked-out connection. Returned to the pool when dropped.
pub struct PooledConnection {
    conn: PoolConnection<Postgres>,
    _permit: GatePermit,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection").finish_non_exhaustive()
    }
}

impl PooledConnection {
    /// Run one statement in `mode`.
    pub async fn run(
        &mut self,
        statement: &Statement,
        mode: ExecutionMode,
        fetch: Fetch,
    ) -> GatewayResult<Outcome> {
        let start = Instant::now();
        debug!(
            sql = %statement.sql(),
            params = statement.params().len(),
            mode = ?mode,
            "Executing statement"
        );

        let mut outcome = match mode {
            ExecutionMode::Autocommit => perform(&mut self.conn, statement, fetch).await?,
            ExecutionMode::ReadOnly | ExecutionMode::Transactional => {
                let mut tx = self.conn.begin().await?;
                if mode == ExecutionMode::ReadOnly {
                    (&mut *tx).execute("SET TRANSACTION READ ONLY").await?;
                }
                match perform(&mut *tx, statement, fetch).await {
                    Ok(outcome) => {
                        tx.commit().await?;
                        outcome
                    }
                    Err(e) => {
                        rollback_quietly(tx).await;
                        return Err(e);
                    }
                }
            }
        };

        outcome.elapsed_ms = start.elapsed().as_millis() as u64;
        Ok(outcome)
    }

    /// Run `render`, then execute every statement text it returns.
    ///
    /// `render` must yield rows whose first column is a SQL string. Everything
    /// happens in one transaction on this connection. The rendered text is
    /// not logged since it may embed a password literal.
    pub async fn run_rendered(&mut self, render: &Statement) -> GatewayResult<Outcome> {
        let start = Instant::now();
        debug!(
            sql = %render.sql(),
            params = render.params().len(),
            "Rendering statements"
        );

        let mut tx = self.conn.begin().await?;
        let result = async {
            let rendered = perform(&mut *tx, render, Fetch::Rows).await?;
            let mut outcome = Outcome::default();
            for row in &rendered.rows {
                let Some(sql) = row.values().next().and_then(|v| v.as_str()) else {
                    return Err(GatewayError::internal(
                        "render statement did not return SQL text",
                    ));
                };
                let done = (&mut *tx).execute(sql).await?;
                outcome.rows_affected += done.rows_affected();
                outcome.statements += 1;
            }
            Ok::<_, GatewayError>(outcome)
        }
        .await;

        match result {
            Ok(mut outcome) => {
                tx.commit().await?;
                outcome.elapsed_ms = start.elapsed().as_millis() as u64;
                Ok(outcome)
            }
            Err(e) => {
                rollback_quietly(tx).await;
                Err(e)
            }
        }
    }

    /// Return the connection to the pool.
    pub fn release(self) {
        drop(self);
    }
}

async fn rollback_quietly(tx: sqlx::Transaction<'_, Postgres>) {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "Rollback failed; connection will be discarded");
    }
}

/// Send `statement` on `conn` with the protocol it asks for.
async fn perform(
    conn: &mut PgConnection,
    statement: &Statement,
    fetch: Fetch,
) -> GatewayResult<Outcome> {
    let outcome = match (statement.protocol(), fetch) {
        (Protocol::Simple, Fetch::Rows) => {
            let rows: Vec<PgRow> = conn.fetch(statement.sql()).try_collect().await?;
            Outcome::from_rows(rows)
        }
        (Protocol::Simple, Fetch::RowsAffected) => {
            let done = conn.execute(statement.sql()).await?;
            Outcome::from_count(done.rows_affected())
        }
        (Protocol::Extended, Fetch::Rows) => {
            let query = bind_all(
                sqlx::query(statement.sql()).persistent(false),
                statement.params(),
            );
            let rows = query.fetch_all(&mut *conn).await?;
            Outcome::from_rows(rows)
        }
        (Protocol::Extended, Fetch::RowsAffected) => {
            let query = bind_all(
                sqlx::query(statement.sql()).persistent(false),
                statement.params(),
            );
            let done = query.execute(&mut *conn).await?;
            Outcome::from_count(done.rows_affected())
        }
    };
    Ok(outcome)
}
