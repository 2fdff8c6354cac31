//! HTTP API endpoints.
//!
//! Public ballot routes are used by the voting and results views; admin routes
//! export and import the ledger for backup and restoration.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::abuse::{self, AbuseConfig};
use crate::auth::{self, AuthConfig};
use crate::error::{ElectionError, ElectionResult};
use crate::state::export::LedgerExport;
use crate::state::AppState;
use crate::types::*;

/// Build the API router with all middleware attached
pub fn router(state: Arc<AppState>, auth_config: Arc<AuthConfig>, abuse_config: Arc<AbuseConfig>) -> Router {
    // Only vote attempts spend the per-token quota
    let vote_route = Router::new()
        .route("/api/vote", post(cast_vote))
        .layer(middleware::from_fn_with_state(
            abuse_config.clone(),
            abuse::throttle_vote_attempts,
        ));

    let ballot_routes = Router::new()
        .route("/api/check-vote/{voter_token}", get(check_vote))
        .merge(vote_route)
        .layer(middleware::from_fn_with_state(
            abuse_config,
            abuse::block_scripted_clients,
        ));

    let admin_routes = Router::new()
        .route("/api/state/export", get(export_state))
        .route("/api/state/import", post(import_state))
        .layer(middleware::from_fn_with_state(
            auth_config,
            auth::admin_auth_middleware,
        ));

    Router::new()
        .route("/api/candidates", get(list_candidates))
        .route("/api/results", get(get_results))
        .route("/api/health", get(health))
        .merge(ballot_routes)
        .merge(admin_routes)
        .with_state(state)
}

/// Full application: API routes, static frontend fallback, CORS and tracing
pub fn app(
    state: Arc<AppState>,
    auth_config: Arc<AuthConfig>,
    abuse_config: Arc<AbuseConfig>,
    static_dir: &std::path::Path,
) -> Router {
    router(state, auth_config, abuse_config)
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// GET /api/candidates
pub async fn list_candidates(State(state): State<Arc<AppState>>) -> Json<Vec<Candidate>> {
    Json(state.candidates().to_vec())
}

/// GET /api/check-vote/{voter_token}
pub async fn check_vote(
    State(state): State<Arc<AppState>>,
    Path(voter_token): Path<String>,
) -> Json<VoteStatus> {
    Json(state.check_vote_status(&voter_token).await)
}

/// POST /api/vote
///
/// 201 with the recorded vote, 400 if the token already voted.
pub async fn cast_vote(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> ElectionResult<(StatusCode, Json<Vote>)> {
    let Json(request) =
        payload.map_err(|rejection| ElectionError::MalformedPayload(rejection.body_text()))?;

    let vote = state
        .submit_vote(&request.candidate_id, &request.voter_token)
        .await?;

    Ok((StatusCode::CREATED, Json(vote)))
}

/// GET /api/results
pub async fn get_results(State(state): State<Arc<AppState>>) -> Json<ResultsSummary> {
    Json(state.get_results().await)
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        total_votes: state.total_votes().await,
        candidates: state.candidates().len(),
    })
}

/// GET /api/state/export
pub async fn export_state(State(state): State<Arc<AppState>>) -> Json<LedgerExport> {
    Json(state.export_ledger().await)
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub added: usize,
    pub total_votes: u64,
}

/// POST /api/state/import
///
/// Grows the ledger from a snapshot; rejects snapshots that would drop or
/// alter recorded votes.
pub async fn import_state(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LedgerExport>, JsonRejection>,
) -> ElectionResult<Json<ImportSummary>> {
    let Json(export) =
        payload.map_err(|rejection| ElectionError::MalformedPayload(rejection.body_text()))?;

    let added = state.import_ledger(export).await.inspect_err(|e| {
        tracing::error!("Ledger import failed: {}", e);
    })?;

    Ok(Json(ImportSummary {
        added,
        total_votes: state.total_votes().await,
    }))
}
