/// Tools Module
///
/// This module contains all MCP tool implementations. Each tool module exports
/// a `register` function that adds its tools to the registry during server
/// initialization, capturing the client handles it needs.

pub mod db;
pub mod echo;
pub mod kv;
pub mod slack;
pub mod todoist;

use serde_json::Value;

use crate::clients::Clients;
use crate::core::config::ServerConfig;
use crate::core::error::ToolError;
use crate::core::server::ToolRegistry;

/// Create the tool registry with every available tool.
///
/// Tools for unconfigured services are still registered; calling them reports
/// that the service is not configured.
pub fn initialize_tools(config: &ServerConfig, clients: &Clients) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    echo::register(&mut registry, &config.echo_prefix);
    kv::register(&mut registry, &clients.kv);
    db::register(&mut registry, &clients.db);
    todoist::register(&mut registry, clients.todoist.clone());
    slack::register(&mut registry, clients.slack.clone());

    registry
}

pub(crate) fn required_str<'a>(args: &'a Value, name: &'static str) -> Result<&'a str, ToolError> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or(ToolError::MissingParameter(name))
}

pub(crate) fn optional_str<'a>(args: &'a Value, name: &'static str) -> Result<Option<&'a str>, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ToolError::InvalidParameter {
            name,
            reason: "expected a string".to_string(),
        }),
    }
}

pub(crate) fn optional_i64(args: &Value, name: &'static str) -> Result<Option<i64>, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or_else(|| ToolError::InvalidParameter {
            name,
            reason: "expected an integer".to_string(),
        }),
    }
}

pub(crate) fn required_i64(args: &Value, name: &'static str) -> Result<i64, ToolError> {
    optional_i64(args, name)?.ok_or(ToolError::MissingParameter(name))
}
