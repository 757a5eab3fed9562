//! Activity, lock and statistics views. Read-only.

use crate::error::{GatewayError, GatewayResult};
use crate::sql::{Statement, StatementBuilder};
use crate::tools::args::{ArgSpec, Args};
use crate::tools::plan::Plan;
use crate::tools::{CatalogContext, OperationDescriptor};

pub(crate) static OPERATIONS: &[OperationDescriptor] = &[
    OperationDescriptor::read(
        "pg_active_queries",
        "Show current backend activity (up to 50 sessions, newest first).",
        &[ArgSpec::flag("include_idle", false, "Include idle sessions")],
        active_queries,
    ),
    OperationDescriptor::read(
        "pg_long_running_queries",
        "Active queries running longer than a threshold.",
        &[ArgSpec::int("min_seconds", "Minimum runtime in seconds").default_int(60)],
        long_running_queries,
    ),
    OperationDescriptor::read(
        "pg_blocking_queries",
        "Pairs of blocked and blocking sessions.",
        &[],
        blocking_queries,
    ),
    OperationDescriptor::read(
        "pg_connection_stats",
        "Connection counts by state and the longest running query.",
        &[],
        connection_stats,
    ),
    OperationDescriptor::read(
        "pg_locks_summary",
        "Lock counts grouped by lock type and mode.",
        &[],
        locks_summary,
    ),
    OperationDescriptor::read(
        "pg_cache_hit_ratio",
        "Heap block cache hit ratio for user tables.",
        &[],
        cache_hit_ratio,
    ),
    OperationDescriptor::read(
        "pg_slowest_queries",
        "Slowest statements by total execution time. Requires the pg_stat_statements extension.",
        &[ArgSpec::int("limit", "Number of statements to return").default_int(20)],
        slowest_queries,
    ),
    OperationDescriptor::read(
        "pg_vacuum_stats",
        "Last vacuum and analyze times per table, least recently autovacuumed first.",
        &[],
        vacuum_stats,
    ),
    OperationDescriptor::read(
        "pg_replication_status",
        "Streaming replication state and lag per standby.",
        &[],
        replication_status,
    ),
    OperationDescriptor::read(
        "pg_database_activity_summary",
        "One-row summary of connections, database size and table row counts.",
        &[],
        database_activity_summary,
    ),
];

const ACTIVE_QUERIES: &str = "SELECT pid, usename::text AS user, \
     application_name AS application, client_addr::text AS client, state, \
     query_start, state_change, wait_event_type, wait_event, left(query, 200) AS query \
     FROM pg_stat_activity WHERE pid <> pg_backend_pid()";

const LONG_RUNNING_QUERIES: &str = "SELECT pid, usename::text AS user, \
     application_name AS application, state, \
     EXTRACT(EPOCH FROM (now() - query_start))::int AS duration_seconds, \
     query_start, left(query, 200) AS query \
     FROM pg_stat_activity \
     WHERE state = 'active' AND pid <> pg_backend_pid() \
       AND query_start < now() - make_interval(secs => $1) \
     ORDER BY query_start";

const BLOCKING_QUERIES: &str = "SELECT blocked_locks.pid AS blocked_pid, \
     blocked_activity.usename::text AS blocked_user, \
     blocking_locks.pid AS blocking_pid, \
     blocking_activity.usename::text AS blocking_user, \
     blocked_activity.query AS blocked_query, \
     blocking_activity.query AS blocking_query, \
     blocked_activity.state AS blocked_state, \
     blocking_activity.state AS blocking_state \
     FROM pg_catalog.pg_locks blocked_locks \
     JOIN pg_catalog.pg_stat_activity blocked_activity ON blocked_activity.pid = blocked_locks.pid \
     JOIN pg_catalog.pg_locks blocking_locks \
       ON blocking_locks.locktype = blocked_locks.locktype \
      AND blocking_locks.database IS NOT DISTINCT FROM blocked_locks.database \
      AND blocking_locks.relation IS NOT DISTINCT FROM blocked_locks.relation \
      AND blocking_locks.page IS NOT DISTINCT FROM blocked_locks.page \
      AND blocking_locks.tuple IS NOT DISTINCT FROM blocked_locks.tuple \
      AND blocking_locks.virtualxid IS NOT DISTINCT FROM blocked_locks.virtualxid \
      AND blocking_locks.transactionid IS NOT DISTINCT FROM blocked_locks.transactionid \
      AND blocking_locks.classid IS NOT DISTINCT FROM blocked_locks.classid \
      AND blocking_locks.objid IS NOT DISTINCT FROM blocked_locks.objid \
      AND blocking_locks.objsubid IS NOT DISTINCT FROM blocked_locks.objsubid \
      AND blocking_locks.pid <> blocked_locks.pid \
     JOIN pg_catalog.pg_stat_activity blocking_activity ON blocking_activity.pid = blocking_locks.pid \
     WHERE NOT blocked_locks.granted";

const CONNECTION_STATS: &str = "SELECT count(*) AS total_connections, \
     count(*) FILTER (WHERE state = 'active') AS active, \
     count(*) FILTER (WHERE state = 'idle') AS idle, \
     count(*) FILTER (WHERE state = 'idle in transaction') AS idle_in_transaction, \
     max(EXTRACT(EPOCH FROM (now() - query_start))::int) AS longest_query_seconds \
     FROM pg_stat_activity WHERE pid <> pg_backend_pid()";

const LOCKS_SUMMARY: &str = "SELECT locktype, mode, count(*) AS count \
     FROM pg_locks GROUP BY locktype, mode ORDER BY count DESC";

const CACHE_HIT_RATIO: &str = "SELECT sum(heap_blks_read) AS heap_read, \
     sum(heap_blks_hit) AS heap_hit, \
     round(sum(heap_blks_hit) * 100.0 / NULLIF(sum(heap_blks_hit) + sum(heap_blks_read), 0), 2) \
       AS cache_hit_ratio \
     FROM pg_statio_user_tables";

const SLOWEST_QUERIES: &str = "SELECT left(query, 200) AS query, calls, \
     round(total_exec_time::numeric, 2) AS total_time_ms, \
     round(mean_exec_time::numeric, 2) AS mean_time_ms, \
     round(max_exec_time::numeric, 2) AS max_time_ms, \
     rows AS total_rows \
     FROM pg_stat_statements ORDER BY total_exec_time DESC LIMIT $1";

const VACUUM_STATS: &str = "SELECT schemaname::text AS schema, relname::text AS table, \
     last_vacuum, last_autovacuum, last_analyze, last_autoanalyze, \
     n_dead_tup AS dead_rows, n_live_tup AS live_rows \
     FROM pg_stat_user_tables \
     ORDER BY last_autovacuum NULLS FIRST, n_dead_tup DESC LIMIT 50";

const REPLICATION_STATUS: &str = "SELECT client_addr::text AS client_addr, state, sync_state, \
     replay_lag, write_lag, flush_lag FROM pg_stat_replication";

const DATABASE_ACTIVITY_SUMMARY: &str = "SELECT \
     (SELECT count(*) FROM pg_stat_activity) AS total_connections, \
     (SELECT count(*) FROM pg_stat_activity WHERE state = 'active') AS active_queries, \
     (SELECT count(*) FROM pg_stat_activity WHERE state = 'idle in transaction') \
       AS idle_in_transaction, \
     pg_size_pretty(pg_database_size(current_database())) AS database_size, \
     (SELECT count(*) FROM pg_stat_user_tables) AS total_tables, \
     (SELECT sum(n_live_tup) FROM pg_stat_user_tables) AS total_rows, \
     (SELECT sum(n_dead_tup) FROM pg_stat_user_tables) AS dead_rows";

fn active_queries(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let statement = StatementBuilder::new(ACTIVE_QUERIES)
        .sql_if(!args.flag("include_idle"), " AND state <> 'idle'")
        .sql(" ORDER BY query_start DESC NULLS LAST LIMIT 50")
        .build();
    Ok(Plan::rows(statement))
}

fn long_running_queries(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let min_seconds = args.int("min_seconds")?;
    if min_seconds < 0 {
        return Err(GatewayError::invalid_argument(
            "min_seconds must not be negative",
        ));
    }
    // make_interval takes double precision seconds.
    Ok(Plan::rows(Statement::with_params(
        LONG_RUNNING_QUERIES,
        vec![(min_seconds as f64).into()],
    )))
}

fn blocking_queries(_: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    Ok(Plan::rows(Statement::fixed(BLOCKING_QUERIES)))
}

fn connection_stats(_: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    Ok(Plan::row(Statement::fixed(CONNECTION_STATS)))
}

fn locks_summary(_: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    Ok(Plan::rows(Statement::fixed(LOCKS_SUMMARY)))
}

fn cache_hit_ratio(_: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    Ok(Plan::row(Statement::fixed(CACHE_HIT_RATIO)))
}

fn slowest_queries(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let limit = args.positive_int("limit")?;
    Ok(Plan::rows(Statement::with_params(
        SLOWEST_QUERIES,
        vec![limit.into()],
    )))
}

fn vacuum_stats(_: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    Ok(Plan::rows(Statement::fixed(VACUUM_STATS)))
}

fn replication_status(_: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    Ok(Plan::rows(Statement::fixed(REPLICATION_STATUS)))
}

fn database_activity_summary(_: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    Ok(Plan::row(Statement::fixed(DATABASE_ACTIVITY_SUMMARY)))
}
