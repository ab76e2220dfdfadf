//! Durable, ordered message log.
//!
//! The store is the source of truth: a message exists once `append` returns
//! and never before. Realtime delivery is layered on top and may fail without
//! affecting anything here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Budget for one append before the store is declared unavailable.
const APPEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Immutable once created; id and timestamp are store-assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    /// Unix milliseconds, authoritative for conversation ordering.
    pub created_at: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("message store unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
    #[error("{0}")]
    Validation(&'static str),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.into())
    }
}

/// Contract with the durable backend. The rest of the service never touches
/// the messages table directly.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably append one message. The store assigns the id and timestamp and
    /// rejects text that is empty after trimming.
    async fn append(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
    ) -> Result<Message, StoreError>;

    /// Every message between the two users, either direction, ascending by
    /// creation order. Finite and safe to call repeatedly.
    async fn list_conversation(&self, a: &str, b: &str) -> Result<Vec<Message>, StoreError>;
}

pub struct SqliteStore {
    pool: SqlitePool,
    /// High-water mark keeping `created_at` strictly increasing even when two
    /// appends land in the same millisecond.
    last_stamp: Mutex<i64>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            last_stamp: Mutex::new(0),
        }
    }

    async fn next_stamp(&self) -> i64 {
        let now = (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        let mut last = self.last_stamp.lock().await;
        *last = now.max(*last + 1);
        *last
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn append(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
    ) -> Result<Message, StoreError> {
        let content = text.trim();
        if content.is_empty() {
            return Err(StoreError::Validation("message text is empty"));
        }

        let message = Message {
            id: Uuid::now_v7(),
            sender_id: sender_id.to_owned(),
            receiver_id: receiver_id.to_owned(),
            content: content.to_owned(),
            created_at: self.next_stamp().await,
        };

        let insert = sqlx::query(
            "INSERT INTO messages (id,sender_id,receiver_id,content,created_at) VALUES (?,?,?,?,?)",
        )
        .bind(message.id.to_string())
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool);

        match tokio::time::timeout(APPEND_TIMEOUT, insert).await {
            Ok(result) => {
                result?;
            }
            Err(_) => {
                return Err(StoreError::Unavailable(anyhow::anyhow!(
                    "append timed out after {APPEND_TIMEOUT:?}"
                )));
            }
        }

        Ok(message)
    }

    async fn list_conversation(&self, a: &str, b: &str) -> Result<Vec<Message>, StoreError> {
        let rows: Vec<(String, String, String, String, i64)> = sqlx::query_as(
            "SELECT id,sender_id,receiver_id,content,created_at FROM messages \
             WHERE (sender_id=? AND receiver_id=?) OR (sender_id=? AND receiver_id=?) \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, sender_id, receiver_id, content, created_at)| {
                Ok(Message {
                    id: Uuid::parse_str(&id)
                        .map_err(|err| StoreError::Unavailable(err.into()))?,
                    sender_id,
                    receiver_id,
                    content,
                    created_at,
                })
            })
            .collect()
    }
}
