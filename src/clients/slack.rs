/// Slack Web API client used by the messaging tools.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://slack.com/api";

/// `conversations.history` rejects larger pages under the current rate limits.
pub const MAX_HISTORY_LIMIT: u32 = 15;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Conversation {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub is_channel: bool,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub is_im: bool,
    #[serde(default)]
    pub is_mpim: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: String,
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    pub ts: String,
    pub thread_ts: Option<String>,
}

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("Slack API error: {0}")]
    Api(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Unexpected Slack response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Slack connection failed: {0}")]
    ConnectionFailed(#[source] Box<SlackError>),
}

pub struct SlackClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl SlackClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn request(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, SlackError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(%url, "slack request");

        let data: Value = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await?
            .json()
            .await?;

        if data.get("ok").and_then(Value::as_bool) != Some(true) {
            let reason = data
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            return Err(SlackError::Api(reason.to_string()));
        }
        Ok(data)
    }

    pub async fn get_conversations(&self, limit: u32) -> Result<Vec<Conversation>, SlackError> {
        let data = self
            .request(
                "conversations.list",
                &[
                    ("limit", limit.to_string()),
                    ("types", "public_channel,private_channel,im,mpim".to_string()),
                    ("exclude_archived", "true".to_string()),
                ],
            )
            .await?;
        list_field(data, "channels")
    }

    pub async fn get_messages(&self, channel_id: &str, limit: u32) -> Result<Vec<Message>, SlackError> {
        let data = self
            .request(
                "conversations.history",
                &[
                    ("channel", channel_id.to_string()),
                    ("limit", limit.min(MAX_HISTORY_LIMIT).to_string()),
                ],
            )
            .await?;
        list_field(data, "messages")
    }

    /// Summary of who the token belongs to, from `auth.test`.
    pub async fn test_connection(&self) -> Result<String, SlackError> {
        let data = self
            .request("auth.test", &[])
            .await
            .map_err(|e| SlackError::ConnectionFailed(Box::new(e)))?;
        let field = |name: &str| data.get(name).and_then(Value::as_str).unwrap_or("N/A").to_string();
        let is_bot = data.get("is_bot").and_then(Value::as_bool).unwrap_or(false);

        Ok(format!(
            "✅ Slack connection successful!\nUser: {} ({})\nTeam: {} ({})\nBot ID: {}\nIs Bot: {}",
            field("user"),
            field("user_id"),
            field("team"),
            field("team_id"),
            field("bot_id"),
            is_bot
        ))
    }
}

// A missing list reads as empty; a malformed one is an error.
fn list_field<T: for<'de> Deserialize<'de>>(mut data: Value, name: &str) -> Result<Vec<T>, SlackError> {
    match data.get_mut(name).map(Value::take) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(list) => serde_json::from_value(list).map_err(|e| {
            warn!(field = name, error = %e, "malformed Slack list");
            SlackError::Decode(e)
        }),
    }
}
