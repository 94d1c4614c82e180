//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool, the startup configuration, and the two
//! broadcast channels behind the metric and manager sockets. Nothing in it
//! is mutated after startup; per-dashboard serialization lives in Postgres.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::services::broadcast::Broadcasts;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub broadcasts: Broadcasts,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self { pool, config: Arc::new(config), broadcasts: Broadcasts::default() }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
