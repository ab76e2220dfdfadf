//! Online/offline transitions mirrored to the identity store.
//!
//! Both writes are best-effort: a failure leaves stale presence until the
//! next transition corrects it, and is never surfaced to the connection that
//! triggered it. Rows in `users` belong to the external identity service, so
//! a transition for an unknown id updates nothing.

use sqlx::SqlitePool;
use tracing::warn;

fn now_ms() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Mark the user online; `last_seen` only means anything while offline.
pub async fn connected(pool: &SqlitePool, user_id: &str) {
    let result = sqlx::query("UPDATE users SET is_online=1, last_seen=NULL WHERE id=?")
        .bind(user_id)
        .execute(pool)
        .await;
    if let Err(err) = result {
        warn!(user_id, %err, "failed to record online transition");
    }
}

/// Mark the user offline with the current wall clock as last-seen.
pub async fn disconnected(pool: &SqlitePool, user_id: &str) {
    let result = sqlx::query("UPDATE users SET is_online=0, last_seen=? WHERE id=?")
        .bind(now_ms())
        .bind(user_id)
        .execute(pool)
        .await;
    if let Err(err) = result {
        warn!(user_id, %err, "failed to record offline transition");
    }
}
