/// Key-Value Store Client
///
/// Redis-backed `get`/`set` layered on a [`SharedConnection`]. Each operation
/// acquires the shared client and issues exactly one command; failures are
/// surfaced as-is, without retries or local caching.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError, RedisResult};
use thiserror::Error;
use tracing::{debug, error};

use crate::core::shared::{ConnectFailed, ConnectionStatus, Connector, SharedConnection};

/// Commands the key-value tools need from a connected client.
#[async_trait]
pub trait KvCommands: Clone + Send + Sync + 'static {
    async fn get(&self, key: &str) -> RedisResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> RedisResult<()>;
}

#[async_trait]
impl KvCommands for MultiplexedConnection {
    async fn get(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.clone();
        AsyncCommands::get(&mut conn, key).await
    }

    async fn set(&self, key: &str, value: &str) -> RedisResult<()> {
        let mut conn = self.clone();
        AsyncCommands::set(&mut conn, key, value).await
    }
}

/// Opens a multiplexed Redis connection, optionally bounded by a timeout.
pub struct RedisConnector {
    url: String,
    connect_timeout: Option<Duration>,
}

impl RedisConnector {
    pub fn new(url: impl Into<String>, connect_timeout: Option<Duration>) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Connector for RedisConnector {
    type Client = MultiplexedConnection;
    type Error = RedisError;

    async fn connect(&self) -> Result<Self::Client, Self::Error> {
        let client = redis::Client::open(self.url.as_str())?;
        let connecting = client.get_multiplexed_async_connection();

        match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connecting).await.map_err(|_| {
                RedisError::from(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no connection within {}ms", limit.as_millis()),
                ))
            })?,
            None => connecting.await,
        }
    }

    fn resource(&self) -> &'static str {
        "redis"
    }
}

#[derive(Debug, Error)]
pub enum KvError {
    #[error("key-value store unavailable: {0}")]
    ConnectFailed(#[from] ConnectFailed<RedisError>),
    #[error("key-value operation failed: {0}")]
    OperationFailed(#[source] RedisError),
}

/// Key-value store backed by one shared connection.
pub struct KvStore<C: Connector = RedisConnector> {
    connection: SharedConnection<C>,
}

impl<C> KvStore<C>
where
    C: Connector<Error = RedisError>,
    C::Client: KvCommands,
{
    pub fn new(connector: C) -> Self {
        Self {
            connection: SharedConnection::new(connector),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let client = self.connection.acquire().await?;
        debug!(key, "kv get");
        KvCommands::get(&client, key).await.map_err(|e| {
            error!(key, error = %e, "kv get failed");
            KvError::OperationFailed(e)
        })
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let client = self.connection.acquire().await?;
        debug!(key, "kv set");
        KvCommands::set(&client, key, value).await.map_err(|e| {
            error!(key, error = %e, "kv set failed");
            KvError::OperationFailed(e)
        })
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn disconnect(&self) -> bool {
        self.connection.disconnect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use redis::ErrorKind;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory stand-in for a Redis connection.
    #[derive(Clone, Default)]
    pub(crate) struct MemoryClient {
        entries: Arc<Mutex<HashMap<String, String>>>,
        fail_commands: Arc<AtomicBool>,
    }

    #[async_trait]
    impl KvCommands for MemoryClient {
        async fn get(&self, key: &str) -> RedisResult<Option<String>> {
            if self.fail_commands.load(Ordering::SeqCst) {
                return Err(RedisError::from((ErrorKind::ResponseError, "WRONGTYPE")));
            }
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> RedisResult<()> {
            if self.fail_commands.load(Ordering::SeqCst) {
                return Err(RedisError::from((ErrorKind::ResponseError, "WRONGTYPE")));
            }
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct MemoryConnector {
        pub(crate) client: MemoryClient,
        pub(crate) attempts: Arc<AtomicUsize>,
        pub(crate) refuse: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Connector for MemoryConnector {
        type Client = MemoryClient;
        type Error = RedisError;

        async fn connect(&self) -> Result<Self::Client, Self::Error> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            if self.refuse.load(Ordering::SeqCst) {
                return Err(RedisError::from(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "ECONNREFUSED",
                )));
            }
            Ok(self.client.clone())
        }
    }

    #[tokio::test]
    async fn concurrent_set_and_get_connect_once() {
        let connector = MemoryConnector::default();
        let attempts = Arc::clone(&connector.attempts);
        let store = KvStore::new(connector);

        let (set, _) = tokio::join!(store.set("a", "1"), store.get("a"));
        set.unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn missing_key_reads_as_none() {
        let store = KvStore::new(MemoryConnector::default());
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn refused_connect_is_retryable() {
        let connector = MemoryConnector::default();
        let refuse = Arc::clone(&connector.refuse);
        refuse.store(true, Ordering::SeqCst);
        let store = KvStore::new(connector);

        let err = store.set("a", "1").await.unwrap_err();
        assert!(matches!(err, KvError::ConnectFailed(_)));
        assert_eq!(store.status(), ConnectionStatus::Disconnected);

        refuse.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;

        store.set("a", "1").await.unwrap();
        assert_eq!(store.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn command_failure_keeps_connection() {
        let connector = MemoryConnector::default();
        let fail = Arc::clone(&connector.client.fail_commands);
        let attempts = Arc::clone(&connector.attempts);
        let store = KvStore::new(connector);

        store.set("a", "1").await.unwrap();
        fail.store(true, Ordering::SeqCst);

        let err = store.get("a").await.unwrap_err();
        assert!(matches!(err, KvError::OperationFailed(_)));
        assert_eq!(store.status(), ConnectionStatus::Connected);

        fail.store(false, Ordering::SeqCst);
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
