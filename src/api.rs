// src/api.rs
// Thin operational surface around the pipeline. No auth, no CRUD: health,
// a manual run trigger, and a read-only view of recent records.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::ingest::{Pipeline, RunReport};
use crate::store::{NewsRecord, RadarStore};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub store: Arc<dyn RadarStore>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/ingest/run", post(ingest_run))
        .route("/news/recent", get(news_recent))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn ingest_run(State(state): State<AppState>) -> Json<RunReport> {
    let outcome = state.pipeline.run_once().await;
    Json(outcome.report)
}

#[derive(serde::Deserialize)]
struct RecentQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    20
}

async fn news_recent(
    State(state): State<AppState>,
    Query(q): Query<RecentQuery>,
) -> Json<Vec<NewsRecord>> {
    match state.store.recent_news(q.limit.min(200)).await {
        Ok(v) => Json(v),
        Err(e) => {
            tracing::warn!(error = ?e, "recent news read failed");
            Json(Vec::new())
        }
    }
}
