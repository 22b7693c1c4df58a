//! HTTP API serving hierarchy snapshots to presentation clients.

use crate::node::SharedRegistry;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use downline_tree::{
    Category, Error as TreeError, Leaderboard, MemberId, NodeSnapshot, TreeSnapshot,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

type AppState = SharedRegistry;

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    // CORS layer for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/health", get(health))
        .route("/api/v1/tree", get(get_tree))
        .route("/api/v1/members/:id", get(get_member))
        .route("/api/v1/leaderboards/:category", get(get_leaderboard))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

fn status_for(e: &TreeError) -> StatusCode {
    match e {
        TreeError::NotBuilt => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn get_tree(State(state): State<AppState>) -> Result<Json<TreeSnapshot>, StatusCode> {
    let registry = state.lock().await;
    registry
        .snapshot()
        .map(Json)
        .map_err(|e| status_for(&e))
}

async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NodeSnapshot>, StatusCode> {
    let registry = state.lock().await;
    let snapshot = registry.snapshot().map_err(|e| status_for(&e))?;
    snapshot
        .get(&MemberId::from(id))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_leaderboard(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Leaderboard>, StatusCode> {
    let category = Category::parse(&category).ok_or(StatusCode::NOT_FOUND)?;
    let registry = state.lock().await;
    registry
        .leaderboard(category)
        .map(Json)
        .map_err(|e| status_for(&e))
}
