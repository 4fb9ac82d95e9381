/// Echo Tool Implementation
///
/// The echo tool takes a message parameter and returns it with the configured
/// prefix (`ECHO_PREFIX`, "Tool echo: " by default).

use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;

use crate::core::error::ToolError;
use crate::core::server::{MCPTool, ToolHandler, ToolRegistry};
use crate::tools::required_str;

/// Register the echo tool with the tool registry.
///
/// # Arguments
/// * `registry` - Mutable reference to the tool registry where the tool will be registered
/// * `prefix` - Text placed in front of every echoed message
pub fn register(registry: &mut ToolRegistry, prefix: &str) {
    let tool = MCPTool {
        name: "echo".to_string(),
        description: "Echo a message back to the user".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to echo"
                }
            },
            "required": ["message"]
        }),
    };

    let prefix: Arc<str> = Arc::from(prefix);
    let handler: ToolHandler = Box::new(move |args: Value| echo(Arc::clone(&prefix), args).boxed());

    registry.register(tool, handler);
}

async fn echo(prefix: Arc<str>, args: Value) -> Result<Value, ToolError> {
    let message = required_str(&args, "message")?;

    // Pre-allocate with known capacity to avoid reallocations
    let mut result = String::with_capacity(prefix.len() + message.len());
    result.push_str(&prefix);
    result.push_str(message);

    Ok(Value::String(result))
}
