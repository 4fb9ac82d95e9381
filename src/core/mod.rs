/// Core Server Framework Module
///
/// This module contains the core server implementation including:
/// - server.rs: MCP server implementation with HTTP and STDIO transport
/// - shared.rs: Single-flight guard around a lazily opened connection
/// - auth.rs: API key gate for the HTTP endpoints
/// - config.rs: Environment-driven configuration
/// - error.rs: HTTP and tool error types
/// - logging.rs: tracing subscriber setup

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod shared;
