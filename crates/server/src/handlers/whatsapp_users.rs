//! WhatsApp end-user registration handlers

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
    db::models::WhatsAppUser,
    db::Repository,
    errors::{AppError, Result},
};

/// Request to register a WhatsApp user under the caller's organization
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterWhatsAppUserRequest {
    /// E.164 digits without the plus sign
    #[validate(length(min = 5, max = 20))]
    pub phone_number: String,

    #[serde(default)]
    pub settings: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct WhatsAppUserResponse {
    pub phone_number: String,
    pub organization_id: Uuid,
    pub is_active: bool,
    pub settings: Option<serde_json::Value>,
    pub created_at: String,
    pub last_active: Option<String>,
}

impl From<WhatsAppUser> for WhatsAppUserResponse {
    fn from(user: WhatsAppUser) -> Self {
        Self {
            phone_number: user.phone_number,
            organization_id: user.organization_id,
            is_active: user.is_active,
            settings: user.settings,
            created_at: user.created_at.to_rfc3339(),
            last_active: user.last_active.map(|dt| dt.to_rfc3339()),
        }
    }
}

/// Register a WhatsApp user. A phone number already registered anywhere
/// (including to another tenant) is rejected with 400.
pub async fn register_whatsapp_user(
    State(state): State<AppState>,
    AuthOrg(org): AuthOrg,
    Json(request): Json<RegisterWhatsAppUserRequest>,
) -> Result<(StatusCode, Json<WhatsAppUserResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let repo = Repository::new(state.db.clone());
    let user = repo
        .create_whatsapp_user(org.id, request.phone_number, request.settings)
        .await?;

    tracing::info!(
        organization_id = %org.id,
        phone_number = %user.phone_number,
        "WhatsApp user registered"
    );

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// List the caller's registered WhatsApp users
pub async fn list_whatsapp_users(
    State(state): State<AppState>,
    AuthOrg(org): AuthOrg,
) -> Result<Json<Vec<WhatsAppUserResponse>>> {
    let repo = Repository::new(state.db.clone());
    let users = repo.list_whatsapp_users(org.id).await?;

    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// Get one registered WhatsApp user by phone number, scoped to the caller
pub async fn get_whatsapp_user(
    State(state): State<AppState>,
    AuthOrg(org): AuthOrg,
    Path(phone_number): Path<String>,
) -> Result<Json<WhatsAppUserResponse>> {
    let repo = Repository::new(state.db.clone());
    let user = repo.find_whatsapp_user(org.id, &phone_number).await?;

    Ok(Json(user.into()))
}
