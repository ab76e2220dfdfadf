//! Contact list: who a user can open a conversation with.
//!
//! The `friends` relation is symmetric; adding a contact inserts both
//! directions so either side sees the other in their list.

use axum::http::StatusCode;
use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    routing::get,
};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::ident::CallerId;
use crate::{AppError, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_contacts))
        .route("/{peer}", axum::routing::post(add_contact))
}

#[derive(Debug, Serialize)]
pub struct Contact {
    pub id: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_online: bool,
    pub last_seen: Option<i64>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_contacts(
    State(db_pool): State<SqlitePool>,
    CallerId(user_id): CallerId,
) -> AppResult<Json<Vec<Contact>>> {
    // LEFT JOIN: a contact whose identity row has not arrived yet is still a
    // contact, with no profile and offline presence.
    let rows: Vec<(String, Option<String>, Option<String>, bool, Option<i64>)> = sqlx::query_as(
        "SELECT f.friend_id,u.name,u.avatar_url,COALESCE(u.is_online,0),u.last_seen \
         FROM friends f LEFT JOIN users u ON u.id=f.friend_id \
         WHERE f.user_id=? ORDER BY u.name,f.friend_id",
    )
    .bind(&user_id)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(|(id, name, avatar_url, is_online, last_seen)| Contact {
                id,
                name,
                avatar_url,
                is_online,
                last_seen,
            })
            .collect(),
    ))
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_contact(
    State(db_pool): State<SqlitePool>,
    CallerId(user_id): CallerId,
    Path(peer_id): Path<String>,
) -> AppResult<StatusCode> {
    if user_id == peer_id {
        return Err(AppError(
            StatusCode::UNPROCESSABLE_ENTITY,
            anyhow::anyhow!("cannot add yourself as a contact"),
        ));
    }

    sqlx::query("INSERT OR IGNORE INTO friends (user_id,friend_id) VALUES (?,?),(?,?)")
        .bind(&user_id)
        .bind(&peer_id)
        .bind(&peer_id)
        .bind(&user_id)
        .execute(&db_pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
