//! Knowledge base management handlers
//!
//! Metadata CRUD only; vector content is managed by the ingestion pipeline.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthOrg;
use crate::AppState;
use chatdock_common::{
    db::models::KnowledgeBase,
    db::Repository,
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateKnowledgeBaseRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub settings: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct KnowledgeBaseResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub vector_store_ids: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
}

impl From<KnowledgeBase> for KnowledgeBaseResponse {
    fn from(kb: KnowledgeBase) -> Self {
        Self {
            id: kb.id,
            organization_id: kb.organization_id,
            name: kb.name,
            description: kb.description,
            vector_store_ids: kb.vector_store_ids,
            metadata: kb.extra_metadata,
            created_at: kb.created_at.to_rfc3339(),
        }
    }
}

/// Create a knowledge base for the caller's organization
pub async fn create_knowledge_base(
    State(state): State<AppState>,
    AuthOrg(org): AuthOrg,
    Json(request): Json<CreateKnowledgeBaseRequest>,
) -> Result<(StatusCode, Json<KnowledgeBaseResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let repo = Repository::new(state.db.clone());
    let kb = repo
        .create_knowledge_base(org.id, request.name, request.description, request.settings)
        .await?;

    tracing::info!(
        organization_id = %org.id,
        knowledge_base_id = %kb.id,
        "Knowledge base created"
    );

    Ok((StatusCode::CREATED, Json(kb.into())))
}

/// List the caller's knowledge bases
pub async fn list_knowledge_bases(
    State(state): State<AppState>,
    AuthOrg(org): AuthOrg,
) -> Result<Json<Vec<KnowledgeBaseResponse>>> {
    let repo = Repository::new(state.db.clone());
    let kbs = repo.list_knowledge_bases(org.id).await?;

    Ok(Json(kbs.into_iter().map(Into::into).collect()))
}

/// Get one knowledge base. Another tenant's knowledge base is a plain 404.
pub async fn get_knowledge_base(
    State(state): State<AppState>,
    AuthOrg(org): AuthOrg,
    Path(id): Path<Uuid>,
) -> Result<Json<KnowledgeBaseResponse>> {
    let repo = Repository::new(state.db.clone());
    let kb = repo.find_knowledge_base(org.id, id).await?;

    Ok(Json(kb.into()))
}
