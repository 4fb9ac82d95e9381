/// MCP Server Entry Point
///
/// Loads configuration from the environment (see `core::config`), builds the
/// service clients and tool registry once, then starts the configured
/// transports. Both transports share the same clients, so the key-value and
/// database connections are opened at most once per process.

use std::sync::Arc;

use mcp_tools_server::clients::Clients;
use mcp_tools_server::core::config::{ServerConfig, TransportMode};
use mcp_tools_server::core::logging;
use mcp_tools_server::core::server::{self, AppState};
use mcp_tools_server::tools;
use tracing::{error, info};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    logging::init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let clients = match Clients::from_config(&config) {
        Ok(clients) => clients,
        Err(e) => {
            error!(error = %e, "failed to initialize service clients");
            std::process::exit(1);
        }
    };

    info!(
        environment = %config.environment,
        transport = ?config.transport,
        todoist = config.todoist.is_some(),
        slack = config.slack.is_some(),
        "configuration loaded"
    );

    let registry = Arc::new(tools::initialize_tools(&config, &clients));
    let state = Arc::new(AppState::from_config(&config));

    let result = match config.transport {
        // STDIO only: used by MCP Inspector and local development
        TransportMode::Stdio => server::run_server_stdio(state, registry).await,
        // HTTP only: production deployments and web integrations
        TransportMode::Http => server::run_server_http(&config, state, registry).await,
        TransportMode::Both => {
            let stdio_state = Arc::clone(&state);
            let stdio_registry = Arc::clone(&registry);

            // Spawn STDIO server in a background task
            let stdio_handle = tokio::spawn(async move {
                if let Err(e) = server::run_server_stdio(stdio_state, stdio_registry).await {
                    error!(error = %e, "STDIO server error");
                }
            });

            // Run HTTP server in the foreground
            let http_result = server::run_server_http(&config, state, registry).await;

            // If HTTP server exits, abort STDIO task
            stdio_handle.abort();

            http_result
        }
    };

    if clients.kv.disconnect() {
        info!("key-value connection released");
    }

    result
}
