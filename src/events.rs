//! Wire events exchanged over the realtime channel.
//!
//! Clients express intent with `send_message`; the server delivers with
//! `receive_message` and acks the sender's own send with `message_sent`.
//! Senders never get a `receive_message` for their own messages.

use serde::{Deserialize, Serialize};

use crate::store::Message;

/// Client -> server intents.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    SendMessage { receiver_id: String, text: String },
}

/// Server -> client frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent once right after the connection is registered.
    Connected,

    /// Ack for the caller's own send, carrying the store-assigned id and
    /// timestamp. The sender's client renders from this, not from a push.
    MessageSent { message: Message },

    /// Delivery of another user's message to this connection.
    ReceiveMessage { message: Message },

    /// A rejected intent or malformed frame. The connection stays open.
    Error { message: String },
}
