//! Chat-completion client abstraction
//!
//! Mirrors the embedding layer: one trait, an OpenAI implementation, a mock
//! for tests, and a config-driven factory.

use crate::config::ChatConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One turn handed to the chat model
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// Trait for chat completion
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion over the given turns and return the reply text
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Model name
    fn model_name(&self) -> &str;
}

/// OpenAI chat-completions client
pub struct OpenAIChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    base_url: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

impl OpenAIChat {
    /// Create a new chat client from configuration
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::Configuration {
                message: "chat.api_key is required for the openai provider".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::ChatModelError {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ChatModelError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: CompletionResponse =
            response
                .json()
                .await
                .map_err(|e| AppError::ChatModelError {
                    message: format!("Failed to parse response: {}", e),
                })?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::ChatModelError {
                message: "Empty response".to_string(),
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock chat model for testing; echoes the last user turn
pub struct MockChat;

#[async_trait]
impl ChatModel for MockChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("");
        Ok(format!("echo: {}", last_user))
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}

/// Create a chat model based on configuration
pub fn create_chat_model(config: &ChatConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIChat::new(config)?)),
        "mock" => Ok(Arc::new(MockChat)),
        other => {
            tracing::warn!(provider = other, "Unknown chat provider, using mock");
            Ok(Arc::new(MockChat))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_chat_echoes_last_user_turn() {
        let chat = MockChat;
        let messages = vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("second"),
        ];
        let answer = chat.complete(&messages).await.unwrap();
        assert_eq!(answer, "echo: second");
    }

    #[test]
    fn test_chat_message_constructors() {
        assert_eq!(ChatMessage::user("hi").role, "user");
        assert_eq!(ChatMessage::assistant("hi").role, "assistant");
        assert_eq!(ChatMessage::system("hi").role, "system");
    }
}
