//! Conversation history, labelled from the caller's point of view.

use std::sync::Arc;

use serde::Serialize;

use crate::store::{Message, MessageStore, StoreError};

/// A stored message plus whether the requesting user wrote it. The label is
/// the only transformation performed on stored messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledMessage {
    pub from_me: bool,
    #[serde(flatten)]
    pub message: Message,
}

#[derive(Clone)]
pub struct HistoryLoader {
    store: Arc<dyn MessageStore>,
}

impl HistoryLoader {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// All messages between caller and peer, ascending by creation order.
    pub async fn load(
        &self,
        caller_id: &str,
        peer_id: &str,
    ) -> Result<Vec<LabeledMessage>, StoreError> {
        let messages = self.store.list_conversation(caller_id, peer_id).await?;
        Ok(messages
            .into_iter()
            .map(|message| LabeledMessage {
                from_me: message.sender_id == caller_id,
                message,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::store::SqliteStore;

    async fn loader() -> (HistoryLoader, Arc<dyn MessageStore>) {
        let store: Arc<dyn MessageStore> = Arc::new(SqliteStore::new(db::test_pool().await));
        (HistoryLoader::new(store.clone()), store)
    }

    #[tokio::test]
    async fn labels_follow_the_caller() {
        let (loader, store) = loader().await;
        store.append("a", "b", "from a").await.unwrap();
        store.append("b", "a", "from b").await.unwrap();

        let seen_by_a = loader.load("a", "b").await.unwrap();
        assert_eq!(
            seen_by_a.iter().map(|m| m.from_me).collect::<Vec<_>>(),
            [true, false]
        );

        let seen_by_b = loader.load("b", "a").await.unwrap();
        assert_eq!(
            seen_by_b.iter().map(|m| m.from_me).collect::<Vec<_>>(),
            [false, true]
        );
    }

    #[tokio::test]
    async fn load_is_idempotent() {
        let (loader, store) = loader().await;
        store.append("a", "b", "1").await.unwrap();
        store.append("a", "b", "2").await.unwrap();

        let once = loader.load("a", "b").await.unwrap();
        let twice = loader.load("a", "b").await.unwrap();
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn empty_conversation_loads_empty() {
        let (loader, _store) = loader().await;
        assert!(loader.load("a", "b").await.unwrap().is_empty());
    }
}
