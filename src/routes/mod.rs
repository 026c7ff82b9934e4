//! HTTP surface of the well-status query service.
//!
//! Every handler reads the classified `production_data` table through the
//! shared pool; none of them writes. `main.rs` only sees [`router`].

use axum::Router;
use sqlx::PgPool;

use crate::Config;

mod health;
mod status_summary;

// ---

/// State shared by all handlers.
pub type AppState = (PgPool, Config);

/// Dashboard query routes plus the liveness check.
pub fn router(pool: PgPool, config: Config) -> Router {
    // ---
    let state: AppState = (pool, config);

    Router::new()
        .merge(status_summary::router())
        .merge(health::router())
        .with_state(state)
}
