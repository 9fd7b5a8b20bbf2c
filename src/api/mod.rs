pub mod search;
pub mod sources;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// All HTTP routes, bound to `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", post(search::search))
        .route("/api/searches", post(search::start_search))
        .route("/api/searches/{id}", get(search::get_search))
        .route("/api/sources", get(sources::list_sources))
        .route("/api/config", get(sources::get_config))
        .with_state(state)
}
