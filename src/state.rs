//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool, the realtime subscription hub, the in-memory
//! quiz play sessions, the object store and the loaded configuration. Every
//! field is cheap to clone.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::hub::Hub;
use crate::services::play::PlayRegistry;
use crate::services::storage::{LocalObjectStore, ObjectStore};

/// Shared application state, injected into Axum handlers via State extractor.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub hub: Hub,
    pub plays: PlayRegistry,
    pub storage: Arc<dyn ObjectStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        let storage = Arc::new(LocalObjectStore::new(config.storage_dir.clone(), config.public_base_url.clone()));
        Self::with_storage(pool, config, storage)
    }

    #[must_use]
    pub fn with_storage(pool: PgPool, config: AppConfig, storage: Arc<dyn ObjectStore>) -> Self {
        Self { pool, hub: Hub::new(), plays: PlayRegistry::new(), storage, config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
