//! Configuration from CLI arguments and environment variables.
//!
//! Connection parameters use the standard libpq variables (`PGHOST`,
//! `PGPORT`, ...). Server settings use the `MCP_` prefix.

use crate::db::PoolSettings;
use crate::policy::Policy;
use clap::{Parser, ValueEnum};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::time::Duration;

pub const DEFAULT_PG_PORT: u16 = 5432;
pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";
pub const DEFAULT_POOL_MIN_SIZE: u32 = 1;
pub const DEFAULT_POOL_MAX_SIZE: u32 = 5;
pub const DEFAULT_CHECKOUT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const APPLICATION_NAME: &str = "pg-admin-mcp";

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Streamable HTTP (for web clients)
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// libpq `sslmode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SslMode {
    Disable,
    Allow,
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Allow => PgSslMode::Allow,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

#[derive(Parser, Clone)]
#[command(
    name = "pg-admin-mcp",
    version,
    about = "Policy-gated PostgreSQL administration over MCP"
)]
pub struct Config {
    /// Database server host
    #[arg(long, env = "PGHOST")]
    pub host: String,

    /// Database server port
    #[arg(long, default_value_t = DEFAULT_PG_PORT, env = "PGPORT")]
    pub port: u16,

    /// Database to connect to
    #[arg(long, env = "PGDATABASE")]
    pub dbname: String,

    /// Role to connect as
    #[arg(long, env = "PGUSER")]
    pub user: String,

    /// Password (prefer the environment variable over the flag)
    #[arg(long, env = "PGPASSWORD", hide_env_values = true)]
    pub password: String,

    /// TLS mode
    #[arg(long, value_enum, default_value = "prefer", env = "PGSSLMODE")]
    pub sslmode: SslMode,

    /// Allow dangerous operations. Only the value "true" (any case) enables them.
    #[arg(long, default_value = "false", env = "ENABLE_DANGEROUS", value_name = "BOOL")]
    pub enable_dangerous: String,

    /// Connections kept open while idle
    #[arg(long, default_value_t = DEFAULT_POOL_MIN_SIZE, env = "MCP_POOL_MIN_SIZE")]
    pub pool_min_size: u32,

    /// Upper bound on checked-out connections
    #[arg(long, default_value_t = DEFAULT_POOL_MAX_SIZE, env = "MCP_POOL_MAX_SIZE")]
    pub pool_max_size: u32,

    /// Seconds to wait for a free connection before failing
    #[arg(
        long,
        default_value_t = DEFAULT_CHECKOUT_TIMEOUT_SECS,
        env = "MCP_CHECKOUT_TIMEOUT"
    )]
    pub checkout_timeout: u64,

    /// Seconds to wait for the initial connection
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "MCP_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Server-side statement timeout in seconds (0 keeps the server default)
    #[arg(long, default_value_t = 0, env = "MCP_STATEMENT_TIMEOUT")]
    pub statement_timeout: u64,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "MCP_HTTP_HOST")]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "MCP_HTTP_PORT")]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(long, default_value = DEFAULT_MCP_ENDPOINT, env = "MCP_ENDPOINT")]
    pub mcp_endpoint: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("sslmode", &self.sslmode)
            .field("enable_dangerous", &self.dangerous_enabled())
            .field("pool_min_size", &self.pool_min_size)
            .field("pool_max_size", &self.pool_max_size)
            .field("checkout_timeout", &self.checkout_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .field("transport", &self.transport)
            .field("http_host", &self.http_host)
            .field("http_port", &self.http_port)
            .field("mcp_endpoint", &self.mcp_endpoint)
            .field("log_level", &self.log_level)
            .field("json_logs", &self.json_logs)
            .finish()
    }
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Reject settings the pool cannot honor.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("host", &self.host),
            ("dbname", &self.dbname),
            ("user", &self.user),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{name} must not be empty"));
            }
        }
        if self.pool_max_size == 0 {
            return Err("pool_max_size must be greater than 0".to_string());
        }
        if self.pool_min_size > self.pool_max_size {
            return Err(format!(
                "pool_min_size ({}) cannot exceed pool_max_size ({})",
                self.pool_min_size, self.pool_max_size
            ));
        }
        if !self.mcp_endpoint.starts_with('/') {
            return Err(format!(
                "mcp_endpoint must start with '/', got {:?}",
                self.mcp_endpoint
            ));
        }
        Ok(())
    }

    pub fn dangerous_enabled(&self) -> bool {
        self.enable_dangerous.trim().eq_ignore_ascii_case("true")
    }

    pub fn policy(&self) -> Policy {
        Policy::new(self.dangerous_enabled())
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            min_size: self.pool_min_size,
            max_size: self.pool_max_size,
            checkout_timeout: Duration::from_secs(self.checkout_timeout),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            ..PoolSettings::default()
        }
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.dbname)
            .username(&self.user)
            .password(&self.password)
            .ssl_mode(self.sslmode.into())
            .application_name(APPLICATION_NAME);
        if self.statement_timeout > 0 {
            let millis = self.statement_timeout.saturating_mul(1000);
            options.options([("statement_timeout", millis)])
        } else {
            options
        }
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}
