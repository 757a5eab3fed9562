//! Users and privileges.
//!
//! PostgreSQL cannot bind a parameter inside `CREATE USER ... PASSWORD`, so
//! statements that carry a password are produced by a render statement:
//! `SELECT format('... %I ... PASSWORD %L', $1::text, $2::text)`. The server
//! quotes both values and the pool runs the output in the same transaction.

use crate::db::ExecutionMode;
use crate::error::{GatewayError, GatewayResult};
use crate::sql::{Identifier, StatementBuilder, allow_list};
use crate::tools::args::{ArgSpec, Args, Secret};
use crate::tools::plan::{Plan, RenderReport};
use crate::tools::{CatalogContext, OperationDescriptor};

const USERNAME: ArgSpec = ArgSpec::ident("username", "Role name");

const PRIVILEGE_ARGS: &[ArgSpec] = &[
    USERNAME,
    ArgSpec::text(
        "privileges",
        "Comma-separated privileges (SELECT, INSERT, UPDATE, DELETE, TRUNCATE, REFERENCES, \
         TRIGGER) or ALL PRIVILEGES",
    ),
    ArgSpec::ident("schema", "Schema name"),
    ArgSpec::ident("table", "Table name; omit for all tables in the schema").optional(),
];

pub(crate) static OPERATIONS: &[OperationDescriptor] = &[
    OperationDescriptor::dangerous(
        "pg_create_user",
        "Create a login role with a password.",
        &[
            USERNAME,
            ArgSpec::secret("password", "Password"),
            ArgSpec::flag("superuser", false, "Grant SUPERUSER"),
            ArgSpec::flag("createdb", false, "Grant CREATEDB"),
            ArgSpec::flag("createrole", false, "Grant CREATEROLE"),
            ArgSpec::flag("login", true, "Allow login"),
        ],
        ExecutionMode::Transactional,
        create_user,
    ),
    OperationDescriptor::dangerous(
        "pg_alter_user",
        "Change a role's password or attributes. Omitted attributes are left unchanged.",
        &[
            USERNAME,
            ArgSpec::secret("password", "New password").optional(),
            ArgSpec::tri_state("superuser", "SUPERUSER / NOSUPERUSER"),
            ArgSpec::tri_state("createdb", "CREATEDB / NOCREATEDB"),
            ArgSpec::tri_state("createrole", "CREATEROLE / NOCREATEROLE"),
            ArgSpec::tri_state("login", "LOGIN / NOLOGIN"),
        ],
        ExecutionMode::Transactional,
        alter_user,
    ),
    OperationDescriptor::dangerous(
        "pg_drop_user",
        "Drop a role.",
        &[USERNAME],
        ExecutionMode::Transactional,
        drop_user,
    ),
    OperationDescriptor::dangerous(
        "pg_grant_privileges",
        "Grant table privileges to a role, on one table or on all tables in a schema.",
        PRIVILEGE_ARGS,
        ExecutionMode::Transactional,
        grant_privileges,
    ),
    OperationDescriptor::dangerous(
        "pg_revoke_privileges",
        "Revoke table privileges from a role, on one table or on all tables in a schema.",
        PRIVILEGE_ARGS,
        ExecutionMode::Transactional,
        revoke_privileges,
    ),
];

/// (argument, keyword when true, keyword when false)
const ROLE_ATTRIBUTES: &[(&str, &str, &str)] = &[
    ("superuser", "SUPERUSER", "NOSUPERUSER"),
    ("createdb", "CREATEDB", "NOCREATEDB"),
    ("createrole", "CREATEROLE", "NOCREATEROLE"),
    ("login", "LOGIN", "NOLOGIN"),
];

/// Attribute keywords for every attribute argument that is present.
fn attribute_keywords(args: &Args) -> Vec<&'static str> {
    ROLE_ATTRIBUTES
        .iter()
        .filter_map(|(name, on, off)| {
            args.opt_flag(name)
                .map(|enabled| if enabled { *on } else { *off })
        })
        .collect()
}

/// Render plan for `<command> %I WITH <attributes> PASSWORD %L`.
fn render_with_password(
    format_head: &'static str,
    username: &Identifier,
    attributes: &[&'static str],
    password: &Secret,
) -> Plan {
    let render = StatementBuilder::new("SELECT format('")
        .sql(format_head)
        .keywords(attributes, " ")
        .sql_if(!attributes.is_empty(), " ")
        .sql("PASSWORD %L', ")
        .param(username.as_str())
        .sql("::text, ")
        .param(password.expose())
        .sql("::text) AS statement")
        .build();
    Plan::Render {
        render,
        report: RenderReport::Status,
    }
}

fn create_user(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let attributes = attribute_keywords(args);
    Ok(render_with_password(
        "CREATE USER %I WITH ",
        args.ident("username")?,
        &attributes,
        args.secret("password")?,
    ))
}

fn alter_user(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let username = args.ident("username")?;
    let attributes = attribute_keywords(args);

    match args.opt_secret("password") {
        Some(password) => Ok(render_with_password(
            "ALTER USER %I WITH ",
            username,
            &attributes,
            password,
        )),
        None if attributes.is_empty() => Err(GatewayError::invalid_argument_with_hint(
            "no alterations specified",
            "supply password or at least one of superuser, createdb, createrole, login",
        )),
        None => {
            let statement = StatementBuilder::new("ALTER USER ")
                .ident(username)
                .sql(" WITH ")
                .keywords(&attributes, " ")
                .build();
            Ok(Plan::transactional(statement))
        }
    }
}

fn drop_user(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    let statement = StatementBuilder::new("DROP USER ")
        .ident(args.ident("username")?)
        .build();
    Ok(Plan::transactional(statement))
}

/// `GRANT`/`REVOKE` share everything but the head and the preposition.
fn privilege_statement(
    args: &Args,
    head: &'static str,
    preposition: &'static str,
) -> GatewayResult<Plan> {
    let privileges = allow_list::privileges(args.text("privileges")?)?;
    let schema = args.ident("schema")?;
    let statement = StatementBuilder::new(head).keywords(&privileges, ", ");
    let statement = match args.opt_ident("table") {
        Some(table) => statement.sql(" ON TABLE ").qualified(schema, table),
        None => statement.sql(" ON ALL TABLES IN SCHEMA ").ident(schema),
    };
    let statement = statement
        .sql(preposition)
        .ident(args.ident("username")?)
        .build();
    Ok(Plan::transactional(statement))
}

fn grant_privileges(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    privilege_statement(args, "GRANT ", " TO ")
}

fn revoke_privileges(args: &Args, _: &CatalogContext) -> GatewayResult<Plan> {
    privilege_statement(args, "REVOKE ", " FROM ")
}
