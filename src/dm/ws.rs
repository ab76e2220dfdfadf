//! One realtime connection per task: register, drain pushes, handle intents.

use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message as WsFrame, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::delivery::Coordinator;
use crate::events::{ClientEvent, ServerEvent};
use crate::presence;
use crate::registry::{ChannelHandle, ConnectionRegistry};

#[derive(Deserialize)]
pub(crate) struct WsQuery {
    user_id: String,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn dm_ws(
    Query(WsQuery { user_id }): Query<WsQuery>,
    State(db_pool): State<SqlitePool>,
    State(registry): State<Arc<ConnectionRegistry>>,
    State(coordinator): State<Coordinator>,

    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(async move |stream| {
        let (handle, rx) = registry.register(&user_id);
        presence::connected(&db_pool, &user_id).await;

        run_connection(stream, &coordinator, &handle, rx, &user_id).await;

        // Only the connection that still owns the registry entry may flip the
        // user offline; a replaced connection's exit must not.
        if registry.unregister(&user_id, handle.id()) {
            presence::disconnected(&db_pool, &user_id).await;
        }
        debug!(user_id, "connection closed");
    })
}

async fn run_connection(
    stream: WebSocket,
    coordinator: &Coordinator,
    handle: &ChannelHandle,
    mut rx: tokio::sync::mpsc::Receiver<ServerEvent>,
    user_id: &str,
) {
    let (mut sender, mut receiver) = stream.split();

    // Everything the server says, including this greeting and the send acks
    // below, goes through the registry channel so the socket has a single
    // writer.
    let _ = handle.push(ServerEvent::Connected);

    let mut forward_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(frame) = serde_json::to_string(&event) else {
                continue;
            };
            if sender.send(frame.into()).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = receiver.next().await {
        let WsFrame::Text(text) = frame else {
            continue;
        };

        let event = match serde_json::from_str::<ClientEvent>(text.as_str()) {
            Ok(event) => event,
            Err(err) => {
                let _ = handle.push(ServerEvent::Error {
                    message: format!("malformed frame: {err}"),
                });
                continue;
            }
        };

        match event {
            ClientEvent::SendMessage { receiver_id, text } => {
                let reply = match coordinator.send(user_id, &receiver_id, &text).await {
                    Ok(message) => ServerEvent::MessageSent { message },
                    Err(err) => ServerEvent::Error {
                        message: err.to_string(),
                    },
                };
                let _ = handle.push(reply);
            }
        }
    }

    forward_task.abort();
    let _ = (&mut forward_task).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_query_requires_user_id() {
        assert!(serde_json::from_str::<WsQuery>(r#"{"user_id":"u1"}"#).is_ok());
        assert!(serde_json::from_str::<WsQuery>(r#"{}"#).is_err());
    }
}
