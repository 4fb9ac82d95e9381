/// Slack tools: check the token, list conversations and read channel history.

use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::{Value, json};

use crate::clients::slack::{MAX_HISTORY_LIMIT, SlackClient};
use crate::core::error::ToolError;
use crate::core::server::{MCPTool, ToolFuture, ToolRegistry};
use crate::tools::{optional_i64, required_str};

const DEFAULT_CONVERSATION_LIMIT: u32 = 100;
const DEFAULT_HISTORY_LIMIT: u32 = 10;

type Client = Option<Arc<SlackClient>>;

fn register_op<F>(registry: &mut ToolRegistry, client: &Client, tool: MCPTool, op: F)
where
    F: Fn(Client, Value) -> ToolFuture + Send + Sync + 'static,
{
    let client = client.clone();
    registry.register(tool, Box::new(move |args: Value| op(client.clone(), args)));
}

pub fn register(registry: &mut ToolRegistry, client: Client) {
    register_op(
        registry,
        &client,
        MCPTool {
            name: "slack_test_connection".to_string(),
            description: "Check the Slack token and show which user and team it belongs to".to_string(),
            input_schema: json!({ "type": "object", "properties": {}, "required": [] }),
        },
        |client, _args| test_connection(client).boxed(),
    );
    register_op(
        registry,
        &client,
        MCPTool {
            name: "slack_list_conversations".to_string(),
            description: "List channels, private groups and direct messages visible to the token"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "integer",
                        "description": format!("Maximum number of conversations (default {DEFAULT_CONVERSATION_LIMIT})")
                    }
                },
                "required": []
            }),
        },
        |client, args| list_conversations(client, args).boxed(),
    );
    register_op(
        registry,
        &client,
        MCPTool {
            name: "slack_get_messages".to_string(),
            description: "Read recent messages from a Slack conversation".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "channel_id": { "type": "string", "description": "Conversation id, e.g. C0123456" },
                    "limit": {
                        "type": "integer",
                        "description": format!("Number of messages (default {DEFAULT_HISTORY_LIMIT}, max {MAX_HISTORY_LIMIT})")
                    }
                },
                "required": ["channel_id"]
            }),
        },
        |client, args| get_messages(client, args).boxed(),
    );
}

fn configured(client: Client) -> Result<Arc<SlackClient>, ToolError> {
    client.ok_or(ToolError::NotConfigured("SLACK_API_TOKEN"))
}

fn limit(args: &Value, default: u32) -> Result<u32, ToolError> {
    match optional_i64(args, "limit")? {
        None => Ok(default),
        Some(n) => u32::try_from(n)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ToolError::InvalidParameter {
                name: "limit",
                reason: "expected a positive integer".to_string(),
            }),
    }
}

async fn test_connection(client: Client) -> Result<Value, ToolError> {
    let summary = configured(client)?.test_connection().await?;
    Ok(Value::String(summary))
}

async fn list_conversations(client: Client, args: Value) -> Result<Value, ToolError> {
    let client = configured(client)?;
    let limit = limit(&args, DEFAULT_CONVERSATION_LIMIT)?;
    let conversations = client.get_conversations(limit).await?;
    Ok(json!(conversations))
}

async fn get_messages(client: Client, args: Value) -> Result<Value, ToolError> {
    let client = configured(client)?;
    let channel_id = required_str(&args, "channel_id")?;
    let limit = limit(&args, DEFAULT_HISTORY_LIMIT)?;
    let messages = client.get_messages(channel_id, limit).await?;
    Ok(json!(messages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registry_with(client: Client) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        register(&mut registry, client);
        registry
    }

    #[tokio::test]
    async fn unconfigured_token_is_reported() {
        let registry = registry_with(None);
        for name in ["slack_test_connection", "slack_list_conversations"] {
            let err = registry.call(name, json!({})).await.unwrap().unwrap_err();
            assert!(matches!(err, ToolError::NotConfigured("SLACK_API_TOKEN")));
        }
    }

    #[tokio::test]
    async fn get_messages_uses_default_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.history"))
            .and(query_param("channel", "C1"))
            .and(query_param("limit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "messages": [{"type": "message", "user": "U1", "text": "hello", "ts": "1.0"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = SlackClient::new(reqwest::Client::new(), server.uri(), "xoxb-test");
        let registry = registry_with(Some(Arc::new(client)));

        let messages = registry
            .call("slack_get_messages", json!({"channel_id": "C1"}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(messages[0]["text"], "hello");
        assert_eq!(messages[0]["type"], "message");
    }

    #[tokio::test]
    async fn rejects_non_positive_limit() {
        let client = SlackClient::new(reqwest::Client::new(), "http://127.0.0.1:1", "xoxb-test");
        let registry = registry_with(Some(Arc::new(client)));

        let err = registry
            .call("slack_list_conversations", json!({"limit": 0}))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameter { name: "limit", .. }));
    }
}
