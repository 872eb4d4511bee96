//! Outbound WhatsApp transport
//!
//! Thin client over the Graph API messages endpoint. Dispatch is
//! fire-and-forget: failures are logged and reported as `false`, never
//! propagated to the sender of the inbound message.

use chatdock_common::config::WhatsAppConfig;
use chatdock_common::errors::Result;
use chatdock_common::metrics;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct WhatsAppClient {
    client: reqwest::Client,
    api_base: String,
    phone_id: String,
    api_token: String,
}

#[derive(Serialize)]
struct SendTextRequest<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    message_type: &'static str,
    text: TextBody<'a>,
}

#[derive(Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

impl WhatsAppClient {
    /// Create a new transport client from configuration
    pub fn new(config: &WhatsAppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.send_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            phone_id: config.phone_id.clone(),
            api_token: config.api_token.clone(),
        })
    }

    /// Send a text message. Returns whether dispatch succeeded.
    pub async fn send_text(&self, to: &str, body: &str) -> bool {
        let url = format!("{}/{}/messages", self.api_base, self.phone_id);

        let request = SendTextRequest {
            messaging_product: "whatsapp",
            to,
            message_type: "text",
            text: TextBody { body },
        };

        let sent = match self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                debug!(to, "WhatsApp message dispatched");
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(to, %status, body, "WhatsApp dispatch rejected");
                false
            }
            Err(e) => {
                warn!(to, error = %e, "WhatsApp dispatch failed");
                false
            }
        };

        metrics::record_whatsapp_send(sent);
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_request_shape() {
        let request = SendTextRequest {
            messaging_product: "whatsapp",
            to: "15550001111",
            message_type: "text",
            text: TextBody { body: "hello" },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messaging_product"], "whatsapp");
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"]["body"], "hello");
    }
}
