//! Health check handlers

use crate::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: CheckResult,
    pub document_store: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn check<F, Fut>(probe: F) -> CheckResult
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = chatdock_common::errors::Result<()>>,
{
    let start = std::time::Instant::now();
    match probe().await {
        Ok(_) => CheckResult {
            status: "up".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => CheckResult {
            status: "down".to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    }
}

/// Liveness probe - always healthy while the process runs
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Readiness probe - checks all dependencies
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let database = check(|| async { state.db.ping().await }).await;
    let document_store = check(|| async { state.convo.ping().await }).await;

    let all_up = database.status == "up" && document_store.status == "up";

    Json(ReadyResponse {
        status: if all_up { "ready" } else { "not_ready" }.to_string(),
        checks: HealthChecks {
            database,
            document_store,
        },
    })
}
