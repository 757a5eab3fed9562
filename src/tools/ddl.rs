//! Databases, schemas, tables and indexes.
//!
//! Every operation here is dangerous. Database create/drop cannot run inside
//! a transaction block, so those two run in autocommit.

use crate::db::ExecutionMode;
use crate::error::{GatewayError, GatewayResult};
use crate::sql::{StatementBuilder, allow_list};
use crate::tools::args::{ArgSpec, Args};
use crate::tools::plan::Plan;
use crate::tools::{CatalogContext, OperationDescriptor};

const SCHEMA: ArgSpec = ArgSpec::ident("schema", "Schema name");
const TABLE: ArgSpec = ArgSpec::ident("table", "Table name");
const CASCADE: ArgSpec = ArgSpec::flag("cascade", false, "Also drop dependent objects");

pub(crate) static OPERATIONS: &[OperationDescriptor] = &[
    OperationDescriptor::dangerous(
        "pg_create_database",
        "Create a database.",
        &[
            ArgSpec::ident("database", "Database name"),
            ArgSpec::ident("owner", "Owning role").optional(),
            ArgSpec::text(
                "encoding",
                "Server encoding: UTF8, SQL_ASCII, LATIN1, LATIN2, LATIN9, WIN1250, WIN1251, \
                 WIN1252, KOI8R, EUC_JP, EUC_KR, EUC_CN or ISO_8859_5",
            )
            .default_text("UTF8"),
        ],
        ExecutionMode::Autocommit,
        create_database,
    ),
    OperationDescriptor::dangerous(
        "pg_drop_database",
        "Drop a database. The database this server is connected to cannot be dropped.\n\
         Set force=true to terminate its sessions first (DROP DATABASE ... WITH (FORCE)).",
        &[
            ArgSpec::ident("database", "Database name"),
            ArgSpec::flag("force", false, "Terminate existing sessions before dropping"),
        ],
        ExecutionMode::Autocommit,
        drop_database,
    ),
    OperationDescriptor::dangerous(
        "pg_create_schema",
        "Create a schema.",
        &[
            SCHEMA,
            ArgSpec::ident("authorization", "Owning role").optional(),
        ],
        ExecutionMode::Transactional,
        create_schema,
    ),
    OperationDescriptor::dangerous(
        "pg_drop_schema",
        "Drop a schema. public, information_schema and pg_* schemas are refused.",
        &[SCHEMA, CASCADE],
        ExecutionMode::Transactional,
        drop_schema,
    ),
    OperationDescriptor::dangerous(
        "pg_create_table",
        "Create a table.\ncolumns is raw SQL, e.g. \"id serial PRIMARY KEY, email text NOT NULL\".",
        &[
            SCHEMA,
            TABLE,
            ArgSpec::fragment("columns", "Column and constraint definitions (raw SQL)"),
        ],
        ExecutionMode::Transactional,
        create_table,
    ),
    OperationDescriptor::dangerous(
        "pg_drop_table",
        "Drop a table.",
        &[SCHEMA, TABLE, CASCADE],
        ExecutionMode::Transactional,
        drop_table,
    ),
    OperationDescriptor::dangerous(
        "pg_alter_table",
        "Alter a table.\nalteration is raw SQL, e.g. \"ADD COLUMN created_at timestamptz\".",
        &[
            SCHEMA,
            TABLE,
            ArgSpec::fragment("alteration", "ALTER TABLE action (raw SQL)"),
        ],
        ExecutionMode::Transactional,
        alter_table,
    ),
    OperationDescriptor::dangerous(
        "pg_truncate_table",
        "Remove all rows from a table.",
        &[
            SCHEMA,
            TABLE,
            CASCADE,
            ArgSpec::flag("restart_identity", false, "Reset owned sequences"),
        ],
        ExecutionMode::Transactional,
        truncate_table,
    ),
    OperationDescriptor::dangerous(
        "pg_create_index",
        "Create an index.\ncolumns is raw SQL, e.g. \"email\", \"lower(email)\" or \"created_at DESC\".",
        &[
            SCHEMA,
            TABLE,
            ArgSpec::ident("index_name", "Index name"),
            ArgSpec::fragment("columns", "Indexed columns or expressions (raw SQL)"),
            ArgSpec::flag("unique", false, "Create a unique index"),
            ArgSpec::text("method", "Access method: btree, hash, gist, gin, brin or spgist")
                .default_text("btree"),
        ],
        ExecutionMode::Transactional,
        create_index,
    ),
    OperationDescriptor::dangerous(
        "pg_drop_index",
        "Drop an index.",
        &[SCHEMA, ArgSpec::ident("index_name", "Index name"), CASCADE],
        ExecutionMode::Transactional,
        drop_index,
    ),
    OperationDescriptor::dangerous(
        "pg_reindex",
        "Rebuild one index, or every index of a table. If both are given, index wins.",
        &[
            SCHEMA,
            ArgSpec::ident("table", "Rebuild all indexes of this table").optional(),
            ArgSpec::ident("index", "Rebuild this index").optional(),
        ],
        ExecutionMode::Transactional,
        reindex,
    ),
];

/// Whether a schema name belongs to the system.
pub fn is_protected_schema(name: &str) -> bool {
    matches!(name, "public" | "information_schema") || name.starts_with("pg_")
}

fn create_database(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let encoding = allow_list::encoding(args.text("encoding")?)?;
    let mut statement = StatementBuilder::new("CREATE DATABASE ").ident(args.ident("database")?);
    if let Some(owner) = args.opt_ident("owner") {
        statement = statement.sql(" OWNER ").ident(owner);
    }
    let statement = statement.sql(" ENCODING '").sql(encoding).sql("'").build();
    Ok(Plan::autocommit(statement))
}

fn drop_database(args: &Args, ctx: &CatalogContext) -> GatewayResult<Plan> {
    let database = args.ident("database")?;
    if database.as_str() == ctx.database {
        return Err(GatewayError::invalid_argument(format!(
            "cannot drop database '{database}': the server is connected to it"
        )));
    }
    let statement = StatementBuilder::new("DROP DATABASE ")
        .ident(database)
        .sql_if(args.flag("force"), " WITH (FORCE)")
        .build();
    Ok(Plan::autocommit(statement))
}

fn create_schema(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let mut statement = StatementBuilder::new("CREATE SCHEMA ").ident(args.ident("schema")?);
    if let Some(role) = args.opt_ident("authorization") {
        statement = statement.sql(" AUTHORIZATION ").ident(role);
    }
    Ok(Plan::transactional(statement.build()))
}

fn drop_schema(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let schema = args.ident("schema")?;
    if is_protected_schema(schema.as_str()) {
        return Err(GatewayError::invalid_argument(format!(
            "cannot drop system schema '{schema}'"
        )));
    }
    let statement = StatementBuilder::new("DROP SCHEMA ")
        .ident(schema)
        .sql_if(args.flag("cascade"), " CASCADE")
        .build();
    Ok(Plan::transactional(statement))
}

fn create_table(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let statement = StatementBuilder::new("CREATE TABLE ")
        .qualified(args.ident("schema")?, args.ident("table")?)
        .sql(" (")
        .fragment(args.fragment("columns")?)
        .sql(")")
        .build();
    Ok(Plan::transactional(statement))
}

fn drop_table(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let statement = StatementBuilder::new("DROP TABLE ")
        .qualified(args.ident("schema")?, args.ident("table")?)
        .sql_if(args.flag("cascade"), " CASCADE")
        .build();
    Ok(Plan::transactional(statement))
}

fn alter_table(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let statement = StatementBuilder::new("ALTER TABLE ")
        .qualified(args.ident("schema")?, args.ident("table")?)
        .sql(" ")
        .fragment(args.fragment("alteration")?)
        .build();
    Ok(Plan::transactional(statement))
}

fn truncate_table(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let statement = StatementBuilder::new("TRUNCATE TABLE ")
        .qualified(args.ident("schema")?, args.ident("table")?)
        .sql_if(args.flag("restart_identity"), " RESTART IDENTITY")
        .sql_if(args.flag("cascade"), " CASCADE")
        .build();
    Ok(Plan::transactional(statement))
}

fn create_index(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let method = allow_list::index_method(args.text("method")?)?;
    let statement = StatementBuilder::new("CREATE ")
        .sql_if(args.flag("unique"), "UNIQUE ")
        .sql("INDEX ")
        .ident(args.ident("index_name")?)
        .sql(" ON ")
        .qualified(args.ident("schema")?, args.ident("table")?)
        .sql(" USING ")
        .sql(method)
        .sql(" (")
        .fragment(args.fragment("columns")?)
        .sql(")")
        .build();
    Ok(Plan::transactional(statement))
}

fn drop_index(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let statement = StatementBuilder::new("DROP INDEX ")
        .qualified(args.ident("schema")?, args.ident("index_name")?)
        .sql_if(args.flag("cascade"), " CASCADE")
        .build();
    Ok(Plan::transactional(statement))
}

fn reindex(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let schema = args.ident("schema")?;
    let statement = match (args.opt_ident("index"), args.opt_ident("table")) {
        (Some(index), _) => StatementBuilder::new("REINDEX INDEX ").qualified(schema, index),
        (None, Some(table)) => StatementBuilder::new("REINDEX TABLE ").qualified(schema, table),
        (None, None) => {
            return Err(GatewayError::invalid_argument(
                "either table or index must be specified",
            ));
        }
    };
    Ok(Plan::transactional(statement.build()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::tools::find;
    use serde_json::json;

    fn build(name: &str, input: serde_json::Value) -> GatewayResult<Plan> {
        let op = find(name).unwrap();
        let args = op.parse_args(input.as_object())?;
        (op.build)(&args, &CatalogContext::new("appdb"))
    }

    fn sql(name: &str, input: serde_json::Value) -> String {
        build(name, input).unwrap().statement().unwrap().sql().to_string()
    }

    #[test]
    fn test_create_database() {
        assert_eq!(
            sql("pg_create_database", json!({"database": "analytics"})),
            "CREATE DATABASE \"analytics\" ENCODING 'UTF8'"
        );
        assert_eq!(
            sql(
                "pg_create_database",
                json!({"database": "analytics", "owner": "alice", "encoding": "latin1"})
            ),
            "CREATE DATABASE \"analytics\" OWNER \"alice\" ENCODING 'LATIN1'"
        );
        let plan = build("pg_create_database", json!({"database": "a"})).unwrap();
        assert_eq!(plan.mode(), ExecutionMode::Autocommit);
    }

    #[test]
    fn test_create_database_rejects_unknown_encoding() {
        let err = build(
            "pg_create_database",
            json!({"database": "a", "encoding": "UTF8' TEMPLATE x --"}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_drop_database() {
        assert_eq!(
            sql("pg_drop_database", json!({"database": "old", "force": true})),
            "DROP DATABASE \"old\" WITH (FORCE)"
        );
        let err = build("pg_drop_database", json!({"database": "appdb"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_drop_schema_refuses_system_schemas() {
        for schema in ["public", "information_schema", "pg_catalog", "pg_toast"] {
            let err = build("pg_drop_schema", json!({"schema": schema})).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{schema}");
        }
        assert_eq!(
            sql("pg_drop_schema", json!({"schema": "staging", "cascade": true})),
            "DROP SCHEMA \"staging\" CASCADE"
        );
    }

    #[test]
    fn test_table_statements() {
        assert_eq!(
            sql(
                "pg_create_table",
                json!({"schema": "public", "table": "t", "columns": "id serial PRIMARY KEY"})
            ),
            "CREATE TABLE \"public\".\"t\" (id serial PRIMARY KEY)"
        );
        assert_eq!(
            sql("pg_drop_table", json!({"schema": "public", "table": "t"})),
            "DROP TABLE \"public\".\"t\""
        );
        assert_eq!(
            sql(
                "pg_alter_table",
                json!({"schema": "public", "table": "t", "alteration": "ADD COLUMN x int"})
            ),
            "ALTER TABLE \"public\".\"t\" ADD COLUMN x int"
        );
        assert_eq!(
            sql(
                "pg_truncate_table",
                json!({"schema": "public", "table": "t", "cascade": true, "restart_identity": true})
            ),
            "TRUNCATE TABLE \"public\".\"t\" RESTART IDENTITY CASCADE"
        );
    }

    #[test]
    fn test_create_index() {
        assert_eq!(
            sql(
                "pg_create_index",
                json!({"schema": "public", "table": "users", "index_name": "users_email_idx",
                       "columns": "lower(email)", "unique": true})
            ),
            "CREATE UNIQUE INDEX \"users_email_idx\" ON \"public\".\"users\" USING btree (lower(email))"
        );
        let err = build(
            "pg_create_index",
            json!({"schema": "public", "table": "t", "index_name": "i", "columns": "a",
                   "method": "btree; DROP TABLE t"}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_reindex_prefers_index() {
        assert_eq!(
            sql("pg_reindex", json!({"schema": "public", "table": "t", "index": "i"})),
            "REINDEX INDEX \"public\".\"i\""
        );
        assert_eq!(
            sql("pg_reindex", json!({"schema": "public", "table": "t"})),
            "REINDEX TABLE \"public\".\"t\""
        );
        let err = build("pg_reindex", json!({"schema": "public"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_invalid_identifier_builds_nothing() {
        let err = build("pg_drop_table", json!({"schema": "public", "table": "t\"; --"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);
    }
}
