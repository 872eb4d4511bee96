//! Organization management handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use chatdock_common::{
    db::Repository,
    errors::{AppError, Result},
};

/// Request to create a new organization
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[serde(default)]
    pub settings: Option<serde_json::Value>,
}

/// Response after creating an organization. This is the only place the API
/// key is ever returned.
#[derive(Serialize)]
pub struct OrganizationResponse {
    pub id: Uuid,
    pub name: String,
    pub api_key: String,
    pub is_active: bool,
    pub settings: Option<serde_json::Value>,
    pub created_at: String,
}

/// Create a new organization. Unauthenticated: this is how a tenant obtains
/// its API key in the first place.
pub async fn create_organization(
    State(state): State<AppState>,
    Json(request): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<OrganizationResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let repo = Repository::new(state.db.clone());
    let org = repo
        .create_organization(request.name, request.settings)
        .await?;

    tracing::info!(organization_id = %org.id, name = %org.name, "Organization created");

    Ok((
        StatusCode::CREATED,
        Json(OrganizationResponse {
            id: org.id,
            name: org.name,
            api_key: org.api_key,
            is_active: org.is_active,
            settings: org.settings,
            created_at: org.created_at.to_rfc3339(),
        }),
    ))
}
