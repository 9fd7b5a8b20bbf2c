use axum::extract::State;
use axum::Json;

use crate::config::SearchConfig;
use crate::models::SourceDescriptor;
use crate::state::AppState;

/// GET /api/sources - Sources every search fans out to
pub async fn list_sources(State(state): State<AppState>) -> Json<Vec<SourceDescriptor>> {
    Json(state.config.sources.clone())
}

/// GET /api/config - Effective aggregator settings
pub async fn get_config(State(state): State<AppState>) -> Json<SearchConfig> {
    Json(state.config.search.clone())
}
