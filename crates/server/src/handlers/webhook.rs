//! WhatsApp webhook gateway
//!
//! GET is the Meta verification handshake; POST carries inbound messages.
//! Both entry points (top-level `/webhook` and
//! `/api/v1/conversations/webhook`) drive the same pipeline; the per-org
//! answer strategy decides retrieval vs chat.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthOrg;
use crate::AppState;
use chatdock_common::errors::{AppError, Result};

const WEBHOOK_OBJECT: &str = "whatsapp_business_account";

/// Query parameters of the verification handshake
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,

    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,

    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Inbound webhook payload (the subset we consume)
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub object: String,

    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub value: WebhookValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookValue {
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub from: String,

    #[serde(rename = "type", default)]
    pub message_type: String,

    pub text: Option<TextContent>,
}

#[derive(Debug, Deserialize)]
pub struct TextContent {
    pub body: String,
}

#[derive(Serialize)]
pub struct WebhookAck {
    pub status: String,
    pub processed: usize,
}

/// Check the handshake parameters against the configured verify token
fn check_handshake(params: &VerifyParams, configured_token: &str) -> Result<String> {
    let subscribed = params.mode.as_deref() == Some("subscribe");
    let token_ok = params.verify_token.as_deref() == Some(configured_token);

    if subscribed && token_ok {
        params
            .challenge
            .clone()
            .ok_or(AppError::InvalidVerifyToken)
    } else {
        Err(AppError::InvalidVerifyToken)
    }
}

/// Pull (sender, body) pairs out of a payload, skipping non-text messages
fn extract_text_messages(payload: &WebhookPayload) -> Vec<(String, String)> {
    payload
        .entry
        .iter()
        .flat_map(|entry| &entry.changes)
        .flat_map(|change| &change.value.messages)
        .filter_map(|message| {
            message
                .text
                .as_ref()
                .map(|text| (message.from.clone(), text.body.clone()))
        })
        .collect()
}

/// A body axum could not turn into a `WebhookPayload` is a 400, not the
/// extractor's default 422
fn payload_error(rejection: JsonRejection) -> AppError {
    AppError::Validation {
        message: rejection.body_text(),
        field: None,
    }
}

/// GET /webhook - Meta verification handshake. Echoes the challenge as
/// text/plain on success, 403 otherwise.
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Result<String> {
    check_handshake(&params, &state.config.whatsapp.verify_token)
}

/// POST /webhook - inbound messages from the WhatsApp platform
pub async fn receive_webhook(
    State(state): State<AppState>,
    AuthOrg(org): AuthOrg,
    payload: std::result::Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<Json<WebhookAck>> {
    let Json(payload) = payload.map_err(payload_error)?;
    process_payload(&state, org, payload).await
}

/// POST /api/v1/conversations/webhook - alternate entry point, same pipeline
pub async fn conversation_webhook(
    State(state): State<AppState>,
    AuthOrg(org): AuthOrg,
    payload: std::result::Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<Json<WebhookAck>> {
    let Json(payload) = payload.map_err(payload_error)?;
    process_payload(&state, org, payload).await
}

async fn process_payload(
    state: &AppState,
    org: chatdock_common::db::models::Organization,
    payload: WebhookPayload,
) -> Result<Json<WebhookAck>> {
    if payload.object != WEBHOOK_OBJECT {
        return Err(AppError::Validation {
            message: format!("unexpected webhook object: {}", payload.object),
            field: Some("object".to_string()),
        });
    }

    let pipeline = state.pipeline();
    let messages = extract_text_messages(&payload);
    let mut processed = 0;

    for (from, body) in &messages {
        match pipeline.handle_incoming(&org, from, body).await {
            Ok(reply) => {
                // Dispatch failure is logged inside the client and does not
                // fail the webhook
                state.whatsapp.send_text(from, &reply).await;
                processed += 1;
            }
            Err(e) => {
                tracing::error!(
                    organization_id = %org.id,
                    from,
                    error = %e,
                    "Failed to process inbound message"
                );
            }
        }
    }

    Ok(Json(WebhookAck {
        status: "received".to_string(),
        processed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(mode: Option<&str>, token: Option<&str>, challenge: Option<&str>) -> VerifyParams {
        VerifyParams {
            mode: mode.map(String::from),
            verify_token: token.map(String::from),
            challenge: challenge.map(String::from),
        }
    }

    #[test]
    fn test_handshake_echoes_challenge() {
        let result = check_handshake(
            &params(Some("subscribe"), Some("secret"), Some("12345")),
            "secret",
        );
        assert_eq!(result.unwrap(), "12345");
    }

    #[test]
    fn test_handshake_rejects_bad_token() {
        let result = check_handshake(
            &params(Some("subscribe"), Some("wrong"), Some("12345")),
            "secret",
        );
        assert!(matches!(result, Err(AppError::InvalidVerifyToken)));
    }

    #[test]
    fn test_handshake_rejects_bad_mode() {
        let result = check_handshake(
            &params(Some("unsubscribe"), Some("secret"), Some("12345")),
            "secret",
        );
        assert!(matches!(result, Err(AppError::InvalidVerifyToken)));
    }

    #[test]
    fn test_handshake_rejects_missing_challenge() {
        let result = check_handshake(&params(Some("subscribe"), Some("secret"), None), "secret");
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_text_messages() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [
                            { "from": "15550001111", "type": "text", "text": { "body": "hello" } },
                            { "from": "15550002222", "type": "image" }
                        ]
                    }
                }]
            }]
        }))
        .unwrap();

        let messages = extract_text_messages(&payload);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], ("15550001111".to_string(), "hello".to_string()));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_bad_request() {
        use axum::body::Body;
        use axum::extract::FromRequest;
        use axum::http::{header, Request, StatusCode};
        use axum::response::IntoResponse;

        // Valid JSON that is missing the required `object` field
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"entry": []}"#))
            .unwrap();

        let rejection = Json::<WebhookPayload>::from_request(request, &())
            .await
            .unwrap_err();

        let response = payload_error(rejection).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_payload_without_messages_parses() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [{ "changes": [{ "value": {} }] }]
        }))
        .unwrap();

        assert!(extract_text_messages(&payload).is_empty());
    }
}
