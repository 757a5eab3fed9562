//! pg-admin-mcp - Main entry point.
//!
//! Serves the PostgreSQL administration catalog as MCP tools over stdio or
//! streamable HTTP.

use pg_admin_mcp::config::{Config, TransportMode};
use pg_admin_mcp::db::ConnectionPool;
use pg_admin_mcp::gateway::Gateway;
use pg_admin_mcp::tools::CatalogContext;
use pg_admin_mcp::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber. Logs go to stderr so that stdout stays
/// reserved for the stdio transport.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();
    init_tracing(&config);

    if let Err(message) = config.validate() {
        eprintln!("Error: {message}");
        std::process::exit(1);
    }

    info!(
        transport = %config.transport,
        dangerous_enabled = config.dangerous_enabled(),
        "Starting pg-admin-mcp v{}",
        env!("CARGO_PKG_VERSION")
    );
    if config.dangerous_enabled() {
        warn!("Dangerous operations are enabled");
    }

    let pool = match ConnectionPool::connect(config.connect_options(), &config.pool_settings()).await
    {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Failed to connect to PostgreSQL");
            return Err(e.into());
        }
    };

    let gateway = Arc::new(Gateway::new(
        pool,
        config.policy(),
        CatalogContext::new(&config.dbname),
    ));

    let result = match config.transport {
        TransportMode::Stdio => {
            let transport = StdioTransport::new(gateway);
            transport.run().await
        }
        TransportMode::Http => {
            info!(
                bind = %config.http_bind_addr(),
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            let transport = HttpTransport::new(
                gateway,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            );
            transport.run().await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
