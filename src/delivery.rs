//! Send orchestration: persist first, then best-effort realtime push.

use std::sync::Arc;

use tracing::warn;

use crate::events::ServerEvent;
use crate::registry::ConnectionRegistry;
use crate::store::{Message, MessageStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("cannot send a message to yourself")]
    InvalidRecipient,
    #[error("message text is empty")]
    EmptyMessage,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The only mutating entry point for sending a message. Every `Ok` means
/// exactly one durable message; the push to the recipient is an optimization
/// that may silently fail.
#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn MessageStore>,
    registry: Arc<ConnectionRegistry>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn MessageStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { store, registry }
    }

    pub async fn send(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
    ) -> Result<Message, SendError> {
        if sender_id == receiver_id {
            return Err(SendError::InvalidRecipient);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SendError::EmptyMessage);
        }

        // A failed append means no message exists and no push happens.
        let message = self.store.append(sender_id, receiver_id, text).await?;

        // The registry is consulted only after the append completes; no
        // registry entry is held across the store call.
        if let Some(handle) = self.registry.lookup(receiver_id) {
            let push = handle.push(ServerEvent::ReceiveMessage {
                message: message.clone(),
            });
            if let Err(err) = push {
                // Durability already succeeded; the recipient catches up
                // from history on reconnect.
                warn!(receiver_id, %err, "realtime push failed");
            }
        }

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::store::SqliteStore;
    use async_trait::async_trait;

    struct DownStore;

    #[async_trait]
    impl MessageStore for DownStore {
        async fn append(&self, _: &str, _: &str, _: &str) -> Result<Message, StoreError> {
            Err(StoreError::Unavailable(anyhow::anyhow!("backend down")))
        }

        async fn list_conversation(&self, _: &str, _: &str) -> Result<Vec<Message>, StoreError> {
            Err(StoreError::Unavailable(anyhow::anyhow!("backend down")))
        }
    }

    async fn coordinator() -> (Coordinator, Arc<dyn MessageStore>, Arc<ConnectionRegistry>) {
        let store: Arc<dyn MessageStore> = Arc::new(SqliteStore::new(db::test_pool().await));
        let registry = Arc::new(ConnectionRegistry::new());
        (
            Coordinator::new(store.clone(), registry.clone()),
            store,
            registry,
        )
    }

    #[tokio::test]
    async fn send_persists_and_returns_the_message() {
        let (coordinator, store, _registry) = coordinator().await;

        let sent = coordinator.send("a", "b", "hello").await.unwrap();
        assert_eq!(sent.sender_id, "a");
        assert_eq!(sent.receiver_id, "b");
        assert_eq!(sent.content, "hello");

        let stored = store.list_conversation("a", "b").await.unwrap();
        assert_eq!(stored, vec![sent]);
    }

    #[tokio::test]
    async fn self_send_is_rejected_without_storing() {
        let (coordinator, store, _registry) = coordinator().await;

        let err = coordinator.send("u", "u", "hi").await.unwrap_err();
        assert!(matches!(err, SendError::InvalidRecipient));
        assert!(store.list_conversation("u", "u").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_text_is_rejected_without_storing() {
        let (coordinator, store, _registry) = coordinator().await;

        let err = coordinator.send("a", "b", "   ").await.unwrap_err();
        assert!(matches!(err, SendError::EmptyMessage));
        assert!(store.list_conversation("a", "b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn connected_recipient_gets_exactly_one_push() {
        let (coordinator, _store, registry) = coordinator().await;
        let (_sender_handle, mut sender_rx) = registry.register("a");
        let (_handle, mut rx) = registry.register("b");

        coordinator.send("a", "b", "x").await.unwrap();

        let Some(ServerEvent::ReceiveMessage { message }) = rx.recv().await else {
            panic!("expected a receive_message push");
        };
        assert_eq!(message.content, "x");
        assert_eq!(message.sender_id, "a");
        assert!(rx.try_recv().is_err());

        // Senders never receive their own pushes.
        assert!(sender_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn offline_recipient_still_sees_the_message_in_history() {
        let (coordinator, store, _registry) = coordinator().await;

        coordinator.send("a", "b", "offline msg").await.unwrap();

        let stored = store.list_conversation("b", "a").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "offline msg");
    }

    #[tokio::test]
    async fn push_failure_is_swallowed() {
        let (coordinator, store, registry) = coordinator().await;
        let (_handle, rx) = registry.register("b");
        drop(rx);

        coordinator.send("a", "b", "into the void").await.unwrap();
        assert_eq!(store.list_conversation("a", "b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn store_failure_propagates_and_nothing_is_pushed() {
        let registry = Arc::new(ConnectionRegistry::new());
        let coordinator = Coordinator::new(Arc::new(DownStore), registry.clone());
        let (_handle, mut rx) = registry.register("b");

        let err = coordinator.send("a", "b", "hi").await.unwrap_err();
        assert!(matches!(err, SendError::Store(StoreError::Unavailable(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn sequential_sends_stay_ordered() {
        let (coordinator, store, _registry) = coordinator().await;

        coordinator.send("a", "b", "1").await.unwrap();
        coordinator.send("a", "b", "2").await.unwrap();

        let contents: Vec<String> = store
            .list_conversation("a", "b")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, ["1", "2"]);
    }
}
