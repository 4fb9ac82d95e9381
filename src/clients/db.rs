/// Item Database Client
///
/// SQLite-backed CRUD over a single `items` table. The pool is opened lazily on
/// first use through the same [`SharedConnection`] guard that backs the
/// key-value store, and the schema is created as part of that first connect.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{debug, error};

use crate::core::shared::{ConnectFailed, ConnectionStatus, Connector, SharedConnection};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

const ITEM_COLUMNS: &str = "id, name, content, created_at, updated_at";

/// Upper bound for `list` so a single call cannot dump the whole table.
pub const MAX_LIST_LIMIT: i64 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Opens the SQLite pool and applies the schema.
pub struct SqliteConnector {
    url: String,
}

impl SqliteConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    type Client = SqlitePool;
    type Error = sqlx::Error;

    async fn connect(&self) -> Result<Self::Client, Self::Error> {
        let options = SqliteConnectOptions::from_str(&self.url)?.create_if_missing(true);

        // An in-memory database lives and dies with its single connection.
        let pool = if self.url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(pool)
    }

    fn resource(&self) -> &'static str {
        "sqlite"
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database unavailable: {0}")]
    ConnectFailed(#[from] ConnectFailed<sqlx::Error>),
    #[error("database operation failed: {0}")]
    OperationFailed(#[source] sqlx::Error),
}

fn operation_failed(op: &'static str) -> impl FnOnce(sqlx::Error) -> DbError {
    move |e| {
        error!(op, error = %e, "database operation failed");
        DbError::OperationFailed(e)
    }
}

pub struct Database {
    connection: SharedConnection<SqliteConnector>,
}

impl Database {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            connection: SharedConnection::new(SqliteConnector::new(url)),
        }
    }

    pub async fn create(&self, name: &str, content: &str) -> Result<Item, DbError> {
        let pool = self.connection.acquire().await?;
        let now = Utc::now().to_rfc3339();
        let item = sqlx::query_as::<_, Item>(&format!(
            "INSERT INTO items (name, content, created_at, updated_at) VALUES (?, ?, ?, ?) RETURNING {ITEM_COLUMNS}"
        ))
        .bind(name)
        .bind(content)
        .bind(&now)
        .bind(&now)
        .fetch_one(&pool)
        .await
        .map_err(operation_failed("create"))?;

        debug!(id = item.id, "item created");
        Ok(item)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Item>, DbError> {
        let pool = self.connection.acquire().await?;
        sqlx::query_as::<_, Item>(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?"))
            .bind(id)
            .fetch_optional(&pool)
            .await
            .map_err(operation_failed("get"))
    }

    /// Update the given fields, leaving `None` fields untouched.
    /// Returns `None` when no item has this id.
    pub async fn update(
        &self,
        id: i64,
        name: Option<&str>,
        content: Option<&str>,
    ) -> Result<Option<Item>, DbError> {
        let pool = self.connection.acquire().await?;
        sqlx::query_as::<_, Item>(&format!(
            "UPDATE items SET name = COALESCE(?, name), content = COALESCE(?, content), updated_at = ? \
             WHERE id = ? RETURNING {ITEM_COLUMNS}"
        ))
        .bind(name)
        .bind(content)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .fetch_optional(&pool)
        .await
        .map_err(operation_failed("update"))
    }

    /// Returns whether a row was deleted.
    pub async fn delete(&self, id: i64) -> Result<bool, DbError> {
        let pool = self.connection.acquire().await?;
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .map_err(operation_failed("delete"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Newest items first, at most `limit` (clamped to 1..=MAX_LIST_LIMIT).
    pub async fn list(&self, limit: i64) -> Result<Vec<Item>, DbError> {
        let pool = self.connection.acquire().await?;
        sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items ORDER BY id DESC LIMIT ?"
        ))
        .bind(limit.clamp(1, MAX_LIST_LIMIT))
        .fetch_all(&pool)
        .await
        .map_err(operation_failed("list"))
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }
}
