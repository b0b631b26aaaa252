pub mod admin;
pub mod search;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// All HTTP routes, bound to `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", post(search::search))
        .route("/api/stats", get(admin::stats))
        .route("/api/reindex", post(admin::reindex))
        .route("/api/config", get(admin::get_config))
        .with_state(state)
}
