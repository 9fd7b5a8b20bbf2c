use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::error::SearchError;
use crate::models::{
    SearchJobResponse, SearchRequest, SearchResponse, SearchStatus, StartSearchResponse,
};
use crate::search::{validate_query, ProgressTracker};
use crate::state::{AppState, JobStatus};

fn error_response(err: SearchError) -> (StatusCode, String) {
    match err {
        SearchError::InvalidQuery => (StatusCode::BAD_REQUEST, "Query is required".to_string()),
        SearchError::AllSourcesFailed { .. } => (StatusCode::BAD_GATEWAY, err.to_string()),
    }
}

/// POST /api/search - Run a search to completion (or early stop) and return
/// the ranked matches with the final progress snapshot.
pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let query = validate_query(&req.query).map_err(error_response)?.to_string();
    let progress = Arc::new(ProgressTracker::new());

    let results = state
        .aggregator
        .search_with_progress(
            &query,
            &state.config.sources,
            &state.config.search,
            progress.clone(),
        )
        .await
        .map_err(error_response)?;

    Ok(Json(SearchResponse {
        query,
        results: results.summaries(),
        progress: progress.snapshot(),
    }))
}

/// POST /api/searches - Start a search in the background. Poll
/// `GET /api/searches/{id}` for progress and results.
pub async fn start_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<(StatusCode, Json<StartSearchResponse>), (StatusCode, String)> {
    let query = validate_query(&req.query).map_err(error_response)?.to_string();
    let (id, progress) = state.track_search(&query).ok_or_else(|| {
        (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many searches running".to_string(),
        )
    })?;

    let task_state = state.clone();
    tokio::spawn(async move {
        let outcome = task_state
            .aggregator
            .search_with_progress(
                &query,
                &task_state.config.sources,
                &task_state.config.search,
                progress,
            )
            .await;
        let status = match outcome {
            Ok(results) => JobStatus::Done(results.summaries()),
            Err(e) => {
                tracing::warn!("Background search {id} failed: {e}");
                JobStatus::Failed(e.to_string())
            }
        };
        task_state.finish_search(id, status);
    });

    Ok((StatusCode::ACCEPTED, Json(StartSearchResponse { id })))
}

/// GET /api/searches/{id} - Progress snapshot, plus results once finished
pub async fn get_search(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SearchJobResponse>, (StatusCode, String)> {
    let job = state
        .search_job(id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Search not found".to_string()))?;

    let (status, results, error) = match job.status {
        JobStatus::Running => (SearchStatus::Running, None, None),
        JobStatus::Done(results) => (SearchStatus::Done, Some(results), None),
        JobStatus::Failed(e) => (SearchStatus::Failed, None, Some(e)),
    };

    Ok(Json(SearchJobResponse {
        id,
        query: job.query,
        status,
        started_at: job.started_at,
        progress: job.progress.snapshot(),
        results,
        error,
    }))
}
