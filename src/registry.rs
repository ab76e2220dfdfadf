//! In-process map of which users currently hold a live realtime channel.
//!
//! Entries live only as long as the process; on restart every client must
//! reconnect. An entry being present means the channel was live when it was
//! registered, not that it still is — pushes can fail and are treated as
//! best-effort by the delivery path.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::events::ServerEvent;

/// Per-connection send buffer. A connection that falls this far behind gets
/// push failures, which delivery treats as a stale channel.
const CONNECTION_BUFFER_SIZE: usize = 64;

/// Addressable reference to one live connection. Cloning shares the same
/// underlying channel.
#[derive(Clone)]
pub struct ChannelHandle {
    id: u64,
    tx: mpsc::Sender<ServerEvent>,
}

#[derive(Debug, thiserror::Error)]
#[error("channel closed or backed up")]
pub struct PushFailed;

impl ChannelHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Best-effort push. Fails if the connection task has gone away or its
    /// buffer is full; the caller decides whether that matters.
    pub fn push(&self, event: ServerEvent) -> Result<(), PushFailed> {
        self.tx.try_send(event).map_err(|_| PushFailed)
    }
}

/// At most one active channel per user id, last writer wins.
pub struct ConnectionRegistry {
    connections: DashMap<String, ChannelHandle>,
    next_handle_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_handle_id: AtomicU64::new(1),
        }
    }

    /// Insert or replace the mapping for `user_id`, returning the new handle
    /// and the receiver its connection task must drain. A replaced handle is
    /// abandoned, not closed: its task exits on its own and its unregister
    /// call no longer matches.
    pub fn register(&self, user_id: &str) -> (ChannelHandle, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(CONNECTION_BUFFER_SIZE);
        let handle = ChannelHandle {
            id: self.next_handle_id.fetch_add(1, Ordering::Relaxed),
            tx,
        };
        self.connections.insert(user_id.to_owned(), handle.clone());
        debug!(user_id, handle_id = handle.id, "registered realtime channel");
        (handle, rx)
    }

    /// Remove the mapping, but only if it still refers to `handle_id` — a
    /// stale disconnect must not clobber a newer connection. Returns whether
    /// a removal actually happened.
    pub fn unregister(&self, user_id: &str, handle_id: u64) -> bool {
        let removed = self
            .connections
            .remove_if(user_id, |_, handle| handle.id == handle_id)
            .is_some();
        if removed {
            debug!(user_id, handle_id, "unregistered realtime channel");
        }
        removed
    }

    /// Pure read, no side effects.
    pub fn lookup(&self, user_id: &str) -> Option<ChannelHandle> {
        self.connections.get(user_id).map(|entry| entry.value().clone())
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_returns_registered_handle() {
        let registry = ConnectionRegistry::new();
        assert!(registry.lookup("u1").is_none());

        let (handle, _rx) = registry.register("u1");
        assert_eq!(registry.lookup("u1").unwrap().id(), handle.id());
        assert!(registry.lookup("u2").is_none());
    }

    #[test]
    fn reregistration_is_last_writer_wins() {
        let registry = ConnectionRegistry::new();
        let (h1, _rx1) = registry.register("u1");
        let (h2, _rx2) = registry.register("u1");

        assert_ne!(h1.id(), h2.id());
        assert_eq!(registry.lookup("u1").unwrap().id(), h2.id());
    }

    #[test]
    fn stale_unregister_is_a_noop() {
        let registry = ConnectionRegistry::new();
        let (h1, _rx1) = registry.register("u1");
        let (h2, _rx2) = registry.register("u1");

        assert!(!registry.unregister("u1", h1.id()));
        assert_eq!(registry.lookup("u1").unwrap().id(), h2.id());

        assert!(registry.unregister("u1", h2.id()));
        assert!(registry.lookup("u1").is_none());
    }

    #[test]
    fn unregister_of_unknown_user_is_a_noop() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.unregister("ghost", 7));
    }

    #[tokio::test]
    async fn push_reaches_the_receiver() {
        let registry = ConnectionRegistry::new();
        let (handle, mut rx) = registry.register("u1");

        handle.push(ServerEvent::Connected).unwrap();
        assert!(matches!(rx.recv().await, Some(ServerEvent::Connected)));
    }

    #[test]
    fn push_to_dropped_receiver_fails() {
        let registry = ConnectionRegistry::new();
        let (handle, rx) = registry.register("u1");
        drop(rx);

        assert!(handle.push(ServerEvent::Connected).is_err());
    }
}
