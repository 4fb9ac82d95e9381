/// External Service Clients
///
/// Each client wraps one collaborator the tools delegate to:
/// - kv.rs: Redis key-value store behind the shared connection guard
/// - db.rs: SQLite item database behind the shared connection guard
/// - todoist.rs: Todoist REST API
/// - slack.rs: Slack Web API

pub mod db;
pub mod kv;
pub mod slack;
pub mod todoist;

use std::sync::Arc;
use std::time::Duration;

use crate::core::config::ServerConfig;
use crate::core::error::AppError;

use db::Database;
use kv::{KvStore, RedisConnector};
use slack::SlackClient;
use todoist::TodoistClient;

/// Owned handles to every external service.
///
/// Built once at startup and shared by both transports, so the key-value and
/// database connections are opened at most once per process. Nothing here
/// connects eagerly.
pub struct Clients {
    pub kv: Arc<KvStore>,
    pub db: Arc<Database>,
    pub todoist: Option<Arc<TodoistClient>>,
    pub slack: Option<Arc<SlackClient>>,
}

impl Clients {
    /// # Errors
    /// Fails only if the shared HTTP client cannot be built.
    pub fn from_config(config: &ServerConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            kv: Arc::new(KvStore::new(RedisConnector::new(
                config.redis_url.clone(),
                config.redis_connect_timeout,
            ))),
            db: Arc::new(Database::new(config.database_url.clone())),
            todoist: config.todoist.as_ref().map(|service| {
                Arc::new(TodoistClient::new(
                    http.clone(),
                    service.base_url.clone(),
                    service.token.clone(),
                ))
            }),
            slack: config.slack.as_ref().map(|service| {
                Arc::new(SlackClient::new(
                    http.clone(),
                    service.base_url.clone(),
                    service.token.clone(),
                ))
            }),
        })
    }
}
