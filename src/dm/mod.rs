mod ws;

use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    routing::get,
};
use serde::Deserialize;

use crate::delivery::Coordinator;
use crate::history::{HistoryLoader, LabeledMessage};
use crate::ident::CallerId;
use crate::store::Message;
use crate::{AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::dm_ws))
        .route("/{peer}", get(conversation).post(send))
}

#[derive(Deserialize)]
pub(crate) struct SendBody {
    text: String,
}

/// HTTP variant of the send path; same coordinator as the realtime channel,
/// so both go through the identical persist-then-push sequence.
#[debug_handler(state = AppState)]
pub(crate) async fn send(
    State(coordinator): State<Coordinator>,
    CallerId(user_id): CallerId,
    Path(peer_id): Path<String>,
    Json(SendBody { text }): Json<SendBody>,
) -> AppResult<Json<Message>> {
    Ok(Json(coordinator.send(&user_id, &peer_id, &text).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn conversation(
    State(history): State<HistoryLoader>,
    CallerId(user_id): CallerId,
    Path(peer_id): Path<String>,
) -> AppResult<Json<Vec<LabeledMessage>>> {
    Ok(Json(history.load(&user_id, &peer_id).await?))
}
