/// Server Configuration
///
/// All settings come from environment variables. Parsing goes through a
/// lookup function so tests can feed a map instead of touching the process
/// environment.
///
/// Environment Variables:
/// - SERVER_NAME: Name of the server (default: "mcp-tools-server")
/// - SERVER_VERSION: Version string (default: crate version)
/// - MCP_TRANSPORT_MODE: "stdio", "http", or "both" (default: "both")
/// - HOST / PORT: Bind address for HTTP mode (default: "0.0.0.0" / 3000)
/// - WORKER_THREADS: HTTP worker count (default: CPU count, max 16)
/// - MCP_API_KEY: Shared secret for the MCP endpoints (unset: open access)
/// - ENVIRONMENT or NODE_ENV: Deployment environment label
/// - ECHO_PREFIX: Prefix for the echo tool (default: "Tool echo: ")
/// - REDIS_URL, REDIS_CONNECT_TIMEOUT_MS: Key-value store connection
/// - DATABASE_URL: SQLite database for the item tools
/// - TODOIST_API_TOKEN, TODOIST_BASE_URL: Task service
/// - SLACK_API_TOKEN, SLACK_BASE_URL: Messaging service

use std::str::FromStr;
use std::time::Duration;

use crate::clients::{slack, todoist};
use crate::core::error::AppError;

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:mcp-tools.db?mode=rwc";
pub const DEFAULT_ECHO_PREFIX: &str = "Tool echo: ";

/// Which transports to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Stdio,
    Http,
    Both,
}

impl FromStr for TransportMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            "both" => Ok(Self::Both),
            other => Err(AppError::Config(format!(
                "Invalid transport mode '{other}'. Must be 'stdio', 'http', or 'both'"
            ))),
        }
    }
}

/// Credentials and endpoint for one external REST service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub token: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub transport: TransportMode,
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub api_key: Option<String>,
    /// Reported at startup only; access control keys off `api_key`.
    pub environment: String,
    pub echo_prefix: String,
    pub redis_url: String,
    pub redis_connect_timeout: Option<Duration>,
    pub database_url: String,
    pub todoist: Option<ServiceConfig>,
    pub slack: Option<ServiceConfig>,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    /// Returns `AppError::Config` for an unknown transport mode or a value that
    /// fails to parse (port, worker count, timeout).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let transport = or("MCP_TRANSPORT_MODE", "both").parse()?;
        let port = parse_or(get("PORT"), "PORT", 3000u16)?;
        let workers = match get("WORKER_THREADS") {
            Some(raw) => parse::<usize>(&raw, "WORKER_THREADS")?.max(1),
            None => num_cpus::get().clamp(1, 16),
        };
        let redis_connect_timeout = get("REDIS_CONNECT_TIMEOUT_MS")
            .map(|raw| parse::<u64>(&raw, "REDIS_CONNECT_TIMEOUT_MS"))
            .transpose()?
            .map(Duration::from_millis);

        let service = |token_key: &str, url_key: &str, default_url: &str| {
            get(token_key).map(|token| ServiceConfig {
                token,
                base_url: or(url_key, default_url),
            })
        };

        Ok(Self {
            name: or("SERVER_NAME", "mcp-tools-server"),
            version: or("SERVER_VERSION", env!("CARGO_PKG_VERSION")),
            transport,
            host: or("HOST", "0.0.0.0"),
            port,
            workers,
            api_key: get("MCP_API_KEY"),
            environment: get("ENVIRONMENT")
                .or_else(|| get("NODE_ENV"))
                .unwrap_or_else(|| "development".to_string()),
            // The prefix may legitimately be blank, so read it unfiltered.
            echo_prefix: lookup("ECHO_PREFIX").unwrap_or_else(|| DEFAULT_ECHO_PREFIX.to_string()),
            redis_url: or("REDIS_URL", DEFAULT_REDIS_URL),
            redis_connect_timeout,
            database_url: or("DATABASE_URL", DEFAULT_DATABASE_URL),
            todoist: service("TODOIST_API_TOKEN", "TODOIST_BASE_URL", todoist::DEFAULT_BASE_URL),
            slack: service("SLACK_API_TOKEN", "SLACK_BASE_URL", slack::DEFAULT_BASE_URL),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: FromStr>(raw: &str, key: &str) -> Result<T, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{key} has an invalid value: '{raw}'")))
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, AppError> {
    raw.map_or(Ok(default), |raw| parse(&raw, key))
}
