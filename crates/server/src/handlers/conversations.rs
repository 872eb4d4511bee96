//! Conversation and message handlers
//!
//! Conversations are addressed two ways: by exact (phone, timestamp) pair, or
//! by the composite id `phone:timestamp` for message operations. Ownership is
//! enforced on every read; a cross-tenant id is 403.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthOrg;
use crate::AppState;
use chatdock_common::{
    convo::{Conversation, ConversationKey, ConversationMeta, Message, MessageRole},
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateConversationRequest {
    #[validate(length(min = 5, max = 20))]
    pub phone_number: String,

    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize)]
pub struct ConversationResponse {
    pub conversation_id: String,
    pub phone_number: String,
    pub timestamp: String,
    pub organization_id: Uuid,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl From<Conversation> for ConversationResponse {
    fn from(conversation: Conversation) -> Self {
        Self {
            conversation_id: conversation.id(),
            phone_number: conversation.phone_number,
            timestamp: conversation.timestamp,
            organization_id: conversation.meta.organization_id,
            metadata: conversation.meta.extra,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMessageRequest {
    #[validate(length(min = 1))]
    pub content: String,

    /// "user" or "assistant"; defaults to "user"
    #[serde(default = "default_role")]
    pub role: String,

    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn default_role() -> String {
    "user".to_string()
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub conversation_id: String,
    pub timestamp: String,
    pub phone_number: String,
    pub role: MessageRole,
    pub content: String,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            conversation_id: message.conversation_id,
            timestamp: message.timestamp,
            phone_number: message.phone_number,
            role: message.role,
            content: message.content,
            metadata: message.extra,
        }
    }
}

/// Build the (phone, metadata) pair for a new conversation. Any well-formed
/// phone number is accepted; registration is not required, matching the
/// webhook path which answers any sender.
fn new_conversation(
    organization_id: Uuid,
    request: CreateConversationRequest,
) -> Result<(String, ConversationMeta)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let meta = ConversationMeta {
        organization_id,
        extra: request.metadata,
    };

    Ok((request.phone_number, meta))
}

/// Start a conversation owned by the caller's organization
pub async fn create_conversation(
    State(state): State<AppState>,
    AuthOrg(org): AuthOrg,
    Json(request): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationResponse>)> {
    let (phone_number, meta) = new_conversation(org.id, request)?;

    let conversation = state.convo.create_conversation(&phone_number, meta).await?;

    tracing::info!(
        organization_id = %org.id,
        conversation_id = %conversation.id(),
        "Conversation created"
    );

    Ok((StatusCode::CREATED, Json(conversation.into())))
}

/// Get a conversation by exact (phone, timestamp) pair
pub async fn get_conversation(
    State(state): State<AppState>,
    AuthOrg(org): AuthOrg,
    Path((phone_number, timestamp)): Path<(String, String)>,
) -> Result<Json<ConversationResponse>> {
    let key = ConversationKey {
        phone_number,
        timestamp,
    };

    let conversation = state.convo.get_conversation(&key, org.id).await?;

    Ok(Json(conversation.into()))
}

/// Append a message to a conversation addressed by composite id
pub async fn create_message(
    State(state): State<AppState>,
    AuthOrg(org): AuthOrg,
    Path(conversation_id): Path<String>,
    Json(request): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let role = request
        .role
        .parse::<MessageRole>()
        .map_err(|message| AppError::Validation {
            message,
            field: Some("role".to_string()),
        })?;

    let key = ConversationKey::parse(&conversation_id)?;
    let conversation = state.convo.get_conversation(&key, org.id).await?;

    let message = state
        .convo
        .create_message(&conversation, role, &request.content, request.metadata)
        .await?;

    Ok((StatusCode::CREATED, Json(message.into())))
}

/// List a conversation's messages in chronological order
pub async fn list_messages(
    State(state): State<AppState>,
    AuthOrg(org): AuthOrg,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<MessageResponse>>> {
    let messages = state.convo.list_messages(&conversation_id, org.id).await?;

    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn request(phone: &str) -> CreateConversationRequest {
        CreateConversationRequest {
            phone_number: phone.to_string(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_any_phone_number_starts_a_conversation() {
        // No registration precondition: an unknown number is accepted and the
        // conversation is stamped with the caller's organization
        let org_id = Uuid::new_v4();
        let (phone, meta) = new_conversation(org_id, request("15559998888")).unwrap();

        assert_eq!(phone, "15559998888");
        assert_eq!(meta.organization_id, org_id);
    }

    #[test]
    fn test_malformed_phone_number_is_rejected() {
        let err = new_conversation(Uuid::new_v4(), request("123")).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_conversation_metadata_is_preserved() {
        let mut metadata = BTreeMap::new();
        metadata.insert("channel".to_string(), serde_json::json!("support"));

        let request = CreateConversationRequest {
            phone_number: "15550001111".to_string(),
            metadata,
        };

        let (_, meta) = new_conversation(Uuid::new_v4(), request).unwrap();
        assert_eq!(meta.extra["channel"], serde_json::json!("support"));
    }
}
