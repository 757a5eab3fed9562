//! Listings and introspection.
//!
//! All operations here are read-only. Names used as filters (schema, table,
//! role) are bound parameters, not interpolated identifiers, so they only
//! need to be valid text. Columns of `information_schema` domain types and
//! `name` columns are cast to `text` for decoding.

use crate::error::GatewayResult;
use crate::sql::{SqlParam, Statement, StatementBuilder};
use crate::tools::args::{ArgSpec, Args};
use crate::tools::plan::Plan;
use crate::tools::{CatalogContext, OperationDescriptor};

const SCHEMA_PUBLIC: ArgSpec = ArgSpec::text("schema", "Schema name").default_text("public");
const SCHEMA: ArgSpec = ArgSpec::text("schema", "Schema name");
const TABLE: ArgSpec = ArgSpec::text("table", "Table name");

pub(crate) static OPERATIONS: &[OperationDescriptor] = &[
    OperationDescriptor::read(
        "pg_health",
        "Basic connectivity and identity check: server time, database, user, address and version.",
        &[],
        health,
    ),
    OperationDescriptor::read(
        "pg_list_schemas",
        "List schemas, excluding pg_catalog and information_schema.",
        &[],
        list_schemas,
    ),
    OperationDescriptor::read(
        "pg_list_tables",
        "List tables in a schema.",
        &[SCHEMA_PUBLIC],
        list_tables,
    ),
    OperationDescriptor::read(
        "pg_describe_table",
        "Describe a table's columns: name, type, nullability and default.",
        &[SCHEMA, TABLE],
        describe_table,
    ),
    OperationDescriptor::read(
        "pg_show_setting",
        "Show a single server setting.",
        &[ArgSpec::text("name", "Setting name, e.g. work_mem")],
        show_setting,
    ),
    OperationDescriptor::read(
        "pg_list_databases",
        "List non-template databases with size and connection counts.",
        &[],
        list_databases,
    ),
    OperationDescriptor::read(
        "pg_database_stats",
        "Statistics for one database: size, connections, connection limit and transaction age.",
        &[ArgSpec::text("database", "Database name; defaults to the connected database").optional()],
        database_stats,
    ),
    OperationDescriptor::read(
        "pg_table_size",
        "Total, heap and index size for the tables of a schema, largest first.",
        &[SCHEMA_PUBLIC, ArgSpec::text("table", "Restrict to one table").optional()],
        table_size,
    ),
    OperationDescriptor::read(
        "pg_table_stats",
        "Row counts, write counters and vacuum/analyze timestamps for a table.",
        &[SCHEMA, TABLE],
        table_stats,
    ),
    OperationDescriptor::read(
        "pg_bloat_check",
        "Tables with dead rows in a schema, top 20 by dead row count.",
        &[SCHEMA_PUBLIC],
        bloat_check,
    ),
    OperationDescriptor::read(
        "pg_list_indexes",
        "List index definitions for a schema or a single table.",
        &[SCHEMA, ArgSpec::text("table", "Restrict to one table").optional()],
        list_indexes,
    ),
    OperationDescriptor::read(
        "pg_index_usage",
        "Index scan counters and sizes, least used first.",
        &[SCHEMA_PUBLIC],
        index_usage,
    ),
    OperationDescriptor::read(
        "pg_unused_indexes",
        "Indexes that were never scanned. Primary key and unique indexes are excluded.",
        &[SCHEMA_PUBLIC],
        unused_indexes,
    ),
    OperationDescriptor::read(
        "pg_list_views",
        "List views in a schema.",
        &[SCHEMA_PUBLIC],
        list_views,
    ),
    OperationDescriptor::read(
        "pg_view_definition",
        "Show the SQL definition of a view.",
        &[SCHEMA, ArgSpec::text("view", "View name")],
        view_definition,
    ),
    OperationDescriptor::read(
        "pg_list_functions",
        "List functions, procedures, aggregates and window functions in a schema.",
        &[SCHEMA_PUBLIC],
        list_functions,
    ),
    OperationDescriptor::read(
        "pg_table_constraints",
        "List a table's constraints (primary key, foreign key, unique, check).",
        &[SCHEMA, TABLE],
        table_constraints,
    ),
    OperationDescriptor::read(
        "pg_foreign_keys",
        "List foreign key relationships in a schema.",
        &[SCHEMA_PUBLIC],
        foreign_keys,
    ),
    OperationDescriptor::read(
        "pg_list_users",
        "List roles and their attributes.",
        &[],
        list_users,
    ),
    OperationDescriptor::read(
        "pg_user_permissions",
        "Table privileges granted to a role.",
        &[ArgSpec::text("username", "Role name")],
        user_permissions,
    ),
    OperationDescriptor::read(
        "pg_table_permissions",
        "Privileges granted on a table.",
        &[SCHEMA, TABLE],
        table_permissions,
    ),
    OperationDescriptor::read(
        "pg_server_settings",
        "List server settings whose name contains a pattern (case-insensitive), or the first 100.",
        &[ArgSpec::text("pattern", "Substring of the setting name").optional()],
        server_settings,
    ),
    OperationDescriptor::read(
        "pg_extensions",
        "List installed extensions.",
        &[],
        extensions,
    ),
    OperationDescriptor::read(
        "pg_tablespaces",
        "List tablespaces with location and size.",
        &[],
        tablespaces,
    ),
];

// =============================================================================
// Queries
// =============================================================================

const HEALTH: &str = "SELECT now() AS server_time, current_database()::text AS database, \
     current_user::text AS user, inet_server_addr()::text AS server_ip, \
     inet_server_port() AS server_port, version() AS version";

const LIST_SCHEMAS: &str = "SELECT nspname::text AS schema FROM pg_namespace \
     WHERE nspname NOT IN ('pg_catalog', 'information_schema') ORDER BY 1";

const LIST_TABLES: &str = "SELECT tablename::text AS table FROM pg_catalog.pg_tables \
     WHERE schemaname = $1 ORDER BY 1";

/// Also used by table dumps, which depend on these column names.
pub(crate) const DESCRIBE_TABLE: &str = "SELECT column_name::text AS column_name, \
     data_type::text AS data_type, is_nullable::text AS is_nullable, \
     column_default::text AS column_default \
     FROM information_schema.columns \
     WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position";

const SHOW_SETTING: &str =
    "SELECT name, setting, unit, context, source FROM pg_settings WHERE name = $1";

const LIST_DATABASES: &str = "SELECT datname::text AS database, \
     pg_size_pretty(pg_database_size(datname)) AS size, \
     pg_database_size(datname) AS size_bytes, \
     (SELECT count(*) FROM pg_stat_activity a WHERE a.datname = d.datname) AS connections \
     FROM pg_database d WHERE NOT datistemplate \
     ORDER BY pg_database_size(datname) DESC";

const DATABASE_STATS: &str = "SELECT datname::text AS database, \
     pg_size_pretty(pg_database_size(datname)) AS size, \
     pg_database_size(datname) AS size_bytes, \
     (SELECT count(*) FROM pg_stat_activity a WHERE a.datname = d.datname) AS active_connections, \
     datconnlimit AS connection_limit, age(datfrozenxid) AS transaction_age \
     FROM pg_database d WHERE datname = $1";

const TABLE_SIZE: &str = "SELECT n.nspname::text AS schema, c.relname::text AS table, \
     pg_size_pretty(pg_total_relation_size(c.oid)) AS total_size, \
     pg_size_pretty(pg_relation_size(c.oid)) AS table_size, \
     pg_size_pretty(pg_indexes_size(c.oid)) AS indexes_size, \
     pg_total_relation_size(c.oid) AS total_bytes \
     FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace \
     WHERE c.relkind IN ('r', 'p') AND n.nspname = ";

const TABLE_STATS: &str = "SELECT schemaname::text AS schema, relname::text AS table, \
     n_live_tup AS live_rows, n_dead_tup AS dead_rows, n_tup_ins AS inserts, \
     n_tup_upd AS updates, n_tup_del AS deletes, last_vacuum, last_autovacuum, \
     last_analyze, last_autoanalyze \
     FROM pg_stat_user_tables WHERE schemaname = $1 AND relname = $2";

const BLOAT_CHECK: &str = "SELECT schemaname::text AS schema, relname::text AS table, \
     pg_size_pretty(pg_total_relation_size(relid)) AS size, \
     n_dead_tup AS dead_rows, n_live_tup AS live_rows, \
     round(n_dead_tup * 100.0 / NULLIF(n_live_tup + n_dead_tup, 0), 2) AS dead_ratio \
     FROM pg_stat_user_tables WHERE schemaname = $1 AND n_dead_tup > 0 \
     ORDER BY n_dead_tup DESC LIMIT 20";

const LIST_INDEXES: &str = "SELECT schemaname::text AS schema, tablename::text AS table, \
     indexname::text AS index, indexdef AS definition \
     FROM pg_indexes WHERE schemaname = ";

const INDEX_USAGE: &str = "SELECT schemaname::text AS schema, relname::text AS table, \
     indexrelname::text AS index, idx_scan AS scans, idx_tup_read AS rows_read, \
     idx_tup_fetch AS rows_fetched, pg_size_pretty(pg_relation_size(indexrelid)) AS size \
     FROM pg_stat_user_indexes WHERE schemaname = $1 \
     ORDER BY idx_scan ASC, pg_relation_size(indexrelid) DESC";

const UNUSED_INDEXES: &str = "SELECT s.schemaname::text AS schema, s.relname::text AS table, \
     s.indexrelname::text AS index, pg_size_pretty(pg_relation_size(s.indexrelid)) AS size, \
     s.idx_scan AS scans \
     FROM pg_stat_user_indexes s JOIN pg_index i ON i.indexrelid = s.indexrelid \
     WHERE s.schemaname = $1 AND s.idx_scan = 0 AND NOT i.indisunique AND NOT i.indisprimary \
     ORDER BY pg_relation_size(s.indexrelid) DESC";

const LIST_VIEWS: &str = "SELECT schemaname::text AS schema, viewname::text AS view, \
     viewowner::text AS owner FROM pg_views WHERE schemaname = $1 ORDER BY viewname";

const VIEW_DEFINITION: &str = "SELECT schemaname::text AS schema, viewname::text AS view, \
     definition FROM pg_views WHERE schemaname = $1 AND viewname = $2";

const LIST_FUNCTIONS: &str = "SELECT n.nspname::text AS schema, p.proname::text AS function, \
     pg_get_function_result(p.oid) AS returns, \
     pg_get_function_arguments(p.oid) AS arguments, \
     CASE p.prokind WHEN 'f' THEN 'function' WHEN 'p' THEN 'procedure' \
     WHEN 'a' THEN 'aggregate' WHEN 'w' THEN 'window' END AS type \
     FROM pg_proc p JOIN pg_namespace n ON p.pronamespace = n.oid \
     WHERE n.nspname = $1 ORDER BY p.proname";

const TABLE_CONSTRAINTS: &str = "SELECT tc.constraint_name::text AS constraint, \
     tc.constraint_type::text AS type, kcu.column_name::text AS column, \
     ccu.table_schema::text AS foreign_schema, ccu.table_name::text AS foreign_table, \
     ccu.column_name::text AS foreign_column \
     FROM information_schema.table_constraints tc \
     LEFT JOIN information_schema.key_column_usage kcu \
       ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
     LEFT JOIN information_schema.constraint_column_usage ccu \
       ON tc.constraint_name = ccu.constraint_name AND tc.table_schema = ccu.table_schema \
     WHERE tc.table_schema = $1 AND tc.table_name = $2 \
     ORDER BY tc.constraint_type, tc.constraint_name";

const FOREIGN_KEYS: &str = "SELECT tc.table_schema::text AS schema, tc.table_name::text AS table, \
     kcu.column_name::text AS column, ccu.table_schema::text AS foreign_schema, \
     ccu.table_name::text AS foreign_table, ccu.column_name::text AS foreign_column, \
     tc.constraint_name::text AS constraint \
     FROM information_schema.table_constraints tc \
     JOIN information_schema.key_column_usage kcu \
       ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
     JOIN information_schema.constraint_column_usage ccu \
       ON tc.constraint_name = ccu.constraint_name AND tc.table_schema = ccu.table_schema \
     WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = $1 \
     ORDER BY tc.table_name, kcu.column_name";

const LIST_USERS: &str = "SELECT rolname::text AS username, rolsuper AS is_superuser, \
     rolinherit AS inherit_privileges, rolcreaterole AS can_create_roles, \
     rolcreatedb AS can_create_db, rolcanlogin AS can_login, \
     rolconnlimit AS connection_limit, rolvaliduntil AS valid_until \
     FROM pg_roles ORDER BY rolname";

const USER_PERMISSIONS: &str = "SELECT table_schema::text AS schema, table_name::text AS table, \
     privilege_type::text AS privilege_type \
     FROM information_schema.table_privileges WHERE grantee = $1 \
     ORDER BY table_schema, table_name, privilege_type";

const TABLE_PERMISSIONS: &str = "SELECT grantee::text AS user, privilege_type::text AS privilege, \
     is_grantable::text AS is_grantable \
     FROM information_schema.table_privileges \
     WHERE table_schema = $1 AND table_name = $2 ORDER BY grantee, privilege_type";

const SERVER_SETTINGS_MATCHING: &str = "SELECT name, setting, unit, category, short_desc \
     FROM pg_settings WHERE name ILIKE $1 ORDER BY name";

const SERVER_SETTINGS_FIRST: &str = "SELECT name, setting, unit, category, short_desc \
     FROM pg_settings ORDER BY category, name LIMIT 100";

const EXTENSIONS: &str = "SELECT extname::text AS extension, extversion AS version, \
     nspname::text AS schema, extrelocatable AS relocatable, extconfig::text AS configuration \
     FROM pg_extension e JOIN pg_namespace n ON e.extnamespace = n.oid ORDER BY extname";

const TABLESPACES: &str = "SELECT spcname::text AS tablespace, \
     pg_tablespace_location(oid) AS location, \
     pg_size_pretty(pg_tablespace_size(oid)) AS size \
     FROM pg_tablespace ORDER BY spcname";

// =============================================================================
// Builders
// =============================================================================

fn text_params(args: &Args, names: &[&str]) -> GatewayResult<Vec<SqlParam>> {
    names
        .iter()
        .map(|name| args.text(name).map(SqlParam::from))
        .collect()
}

fn health(_: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    Ok(Plan::row(Statement::fixed(HEALTH)))
}

fn list_schemas(_: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    Ok(Plan::rows(Statement::fixed(LIST_SCHEMAS)))
}

fn list_tables(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let params = text_params(args, &["schema"])?;
    Ok(Plan::rows(Statement::with_params(LIST_TABLES, params)))
}

fn describe_table(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let params = text_params(args, &["schema", "table"])?;
    Ok(Plan::rows(Statement::with_params(DESCRIBE_TABLE, params)))
}

fn show_setting(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let params = text_params(args, &["name"])?;
    Ok(Plan::row(Statement::with_params(SHOW_SETTING, params)))
}

fn list_databases(_: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    Ok(Plan::rows(Statement::fixed(LIST_DATABASES)))
}

fn database_stats(args: &Args, ctx: &CatalogContext) -> GatewayResult<Plan> {
    let database = args.opt_text("database").unwrap_or(ctx.database.as_str());
    Ok(Plan::row(Statement::with_params(
        DATABASE_STATS,
        vec![database.into()],
    )))
}

fn table_size(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let statement = StatementBuilder::new(TABLE_SIZE).param(args.text("schema")?);
    let statement = match args.opt_text("table") {
        Some(table) => statement.sql(" AND c.relname = ").param(table),
        None => statement,
    };
    Ok(Plan::rows(
        statement
            .sql(" ORDER BY pg_total_relation_size(c.oid) DESC")
            .build(),
    ))
}

fn table_stats(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let params = text_params(args, &["schema", "table"])?;
    Ok(Plan::row(Statement::with_params(TABLE_STATS, params)))
}

fn bloat_check(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let params = text_params(args, &["schema"])?;
    Ok(Plan::rows(Statement::with_params(BLOAT_CHECK, params)))
}

fn list_indexes(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let statement = StatementBuilder::new(LIST_INDEXES).param(args.text("schema")?);
    let statement = match args.opt_text("table") {
        Some(table) => statement.sql(" AND tablename = ").param(table),
        None => statement,
    };
    Ok(Plan::rows(
        statement.sql(" ORDER BY tablename, indexname").build(),
    ))
}

fn index_usage(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let params = text_params(args, &["schema"])?;
    Ok(Plan::rows(Statement::with_params(INDEX_USAGE, params)))
}

fn unused_indexes(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let params = text_params(args, &["schema"])?;
    Ok(Plan::rows(Statement::with_params(UNUSED_INDEXES, params)))
}

fn list_views(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let params = text_params(args, &["schema"])?;
    Ok(Plan::rows(Statement::with_params(LIST_VIEWS, params)))
}

fn view_definition(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let params = text_params(args, &["schema", "view"])?;
    Ok(Plan::row(Statement::with_params(VIEW_DEFINITION, params)))
}

fn list_functions(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let params = text_params(args, &["schema"])?;
    Ok(Plan::rows(Statement::with_params(LIST_FUNCTIONS, params)))
}

fn table_constraints(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let params = text_params(args, &["schema", "table"])?;
    Ok(Plan::rows(Statement::with_params(TABLE_CONSTRAINTS, params)))
}

fn foreign_keys(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let params = text_params(args, &["schema"])?;
    Ok(Plan::rows(Statement::with_params(FOREIGN_KEYS, params)))
}

fn list_users(_: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    Ok(Plan::rows(Statement::fixed(LIST_USERS)))
}

fn user_permissions(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let params = text_params(args, &["username"])?;
    Ok(Plan::rows(Statement::with_params(USER_PERMISSIONS, params)))
}

fn table_permissions(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let params = text_params(args, &["schema", "table"])?;
    Ok(Plan::rows(Statement::with_params(TABLE_PERMISSIONS, params)))
}

fn server_settings(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let statement = match args.opt_text("pattern") {
        Some(pattern) => Statement::with_params(
            SERVER_SETTINGS_MATCHING,
            vec![format!("%{pattern}%").into()],
        ),
        None => Statement::fixed(SERVER_SETTINGS_FIRST),
    };
    Ok(Plan::rows(statement))
}

fn extensions(_: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    Ok(Plan::rows(Statement::fixed(EXTENSIONS)))
}

fn tablespaces(_: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    Ok(Plan::rows(Statement::fixed(TABLESPACES)))
}
