//! Usage ledger handlers
//!
//! Each POST appends one dated row with a single counter set; there is no
//! server-side aggregation. An unknown metric type is a 400, both on record
//! and on the by-type listing.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthOrg;
use crate::AppState;
use chatdock_common::{
    db::models::{MetricKind, UsageMetric},
    db::Repository,
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct RecordUsageMetricRequest {
    /// One of "query", "token", "embedding"
    pub metric_type: String,

    #[serde(default = "default_value")]
    pub value: i32,

    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

fn default_value() -> i32 {
    1
}

#[derive(Serialize)]
pub struct UsageMetricResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub date: String,
    pub query_count: i32,
    pub token_count: i32,
    pub embedding_count: i32,
    pub metadata: Option<serde_json::Value>,
}

impl From<UsageMetric> for UsageMetricResponse {
    fn from(metric: UsageMetric) -> Self {
        Self {
            id: metric.id,
            organization_id: metric.organization_id,
            date: metric.date.to_rfc3339(),
            query_count: metric.query_count,
            token_count: metric.token_count,
            embedding_count: metric.embedding_count,
            metadata: metric.extra_metadata,
        }
    }
}

fn parse_kind(metric_type: &str) -> Result<MetricKind> {
    metric_type
        .parse::<MetricKind>()
        .map_err(|message| AppError::Validation {
            message,
            field: Some("metric_type".to_string()),
        })
}

/// Record one usage event for the caller's organization
pub async fn record_usage_metric(
    State(state): State<AppState>,
    AuthOrg(org): AuthOrg,
    Json(request): Json<RecordUsageMetricRequest>,
) -> Result<(StatusCode, Json<UsageMetricResponse>)> {
    let kind = parse_kind(&request.metric_type)?;

    if request.value <= 0 {
        return Err(AppError::Validation {
            message: "value must be positive".to_string(),
            field: Some("value".to_string()),
        });
    }

    let repo = Repository::new(state.db.clone());
    let metric = repo
        .record_usage(org.id, kind, request.value, request.metadata)
        .await?;

    Ok((StatusCode::CREATED, Json(metric.into())))
}

/// List all usage rows for the caller's organization
pub async fn list_usage_metrics(
    State(state): State<AppState>,
    AuthOrg(org): AuthOrg,
) -> Result<Json<Vec<UsageMetricResponse>>> {
    let repo = Repository::new(state.db.clone());
    let metrics = repo.list_usage(org.id).await?;

    Ok(Json(metrics.into_iter().map(Into::into).collect()))
}

/// List usage rows where the given counter is positive
pub async fn list_usage_metrics_by_type(
    State(state): State<AppState>,
    AuthOrg(org): AuthOrg,
    Path(metric_type): Path<String>,
) -> Result<Json<Vec<UsageMetricResponse>>> {
    let kind = parse_kind(&metric_type)?;

    let repo = Repository::new(state.db.clone());
    let metrics = repo.list_usage_by_kind(org.id, kind).await?;

    Ok(Json(metrics.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind_rejects_unknown() {
        assert!(parse_kind("query").is_ok());
        assert!(parse_kind("token").is_ok());
        assert!(parse_kind("embedding").is_ok());

        let err = parse_kind("latency").unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
