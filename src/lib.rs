pub mod appresult;
pub mod contacts;
pub mod db;
pub mod delivery;
pub mod dm;
pub mod events;
pub mod history;
pub mod ident;
pub mod presence;
pub mod registry;
pub mod store;

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

pub use appresult::{AppError, AppResult};

use crate::delivery::Coordinator;
use crate::history::HistoryLoader;
use crate::registry::ConnectionRegistry;
use crate::store::{MessageStore, SqliteStore};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub registry: Arc<ConnectionRegistry>,
    pub coordinator: Coordinator,
    pub history: HistoryLoader,
}

impl AppState {
    pub fn new(db_pool: SqlitePool) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let store: Arc<dyn MessageStore> = Arc::new(SqliteStore::new(db_pool.clone()));
        Self {
            coordinator: Coordinator::new(store.clone(), registry.clone()),
            history: HistoryLoader::new(store),
            db_pool,
            registry,
        }
    }
}
