//! Embedding client abstraction
//!
//! One trait, two implementations: the OpenAI embeddings API and a mock for
//! tests. Requests are batched and retried with exponential backoff.

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, batching as needed
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Model name
    fn model_name(&self) -> &str;

    /// Embedding dimension
    fn dimension(&self) -> usize;
}

/// OpenAI embedding client
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
    max_retries: u32,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRecord>,
}

#[derive(Deserialize)]
struct EmbeddingRecord {
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder from configuration
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::Configuration {
                message: "embedding.api_key is required for the openai provider".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            max_retries: config.max_retries,
            batch_size: config.batch_size.max(1),
        })
    }

    async fn request_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                // Exponential backoff
                let delay = Duration::from_millis(100 * 2_u64.pow(attempt));
                tokio::time::sleep(delay).await;
            }

            match self.make_request(texts).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %e,
                        "Embedding request failed, retrying"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::EmbeddingError {
            message: "Unknown error after retries".to_string(),
        }))
    }

    async fn make_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);

        let request = EmbeddingRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::EmbeddingError {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| AppError::EmbeddingError {
                    message: format!("Failed to parse response: {}", e),
                })?;

        Ok(result.data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.request_with_retry(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AppError::EmbeddingError {
                message: "Empty response".to_string(),
            })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let embeddings = self.request_with_retry(chunk).await?;
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Mock embedder for testing
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // Deterministic per input so similarity queries are repeatable
        let seed = text.bytes().fold(1_u32, |acc, b| {
            acc.wrapping_mul(31).wrapping_add(b as u32)
        });
        Ok((0..self.dimension)
            .map(|i| {
                let x = seed.wrapping_add(i as u32).wrapping_mul(2654435761);
                (x as f32 / u32::MAX as f32) - 0.5
            })
            .collect())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "mock" => Ok(Arc::new(MockEmbedder::new(config.dimension))),
        other => {
            tracing::warn!(provider = other, "Unknown embedding provider, using mock");
            Ok(Arc::new(MockEmbedder::new(config.dimension)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embedder_dimension() {
        let embedder = MockEmbedder::new(1536);
        let embedding = embedder.embed("test text").await.unwrap();
        assert_eq!(embedding.len(), 1536);
    }

    #[tokio::test]
    async fn test_mock_embedder_deterministic() {
        let embedder = MockEmbedder::new(64);
        let a = embedder.embed("same input").await.unwrap();
        let b = embedder.embed("same input").await.unwrap();
        let c = embedder.embed("different input").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_mock_batch() {
        let embedder = MockEmbedder::new(64);
        let texts = vec!["text1".to_string(), "text2".to_string()];
        let embeddings = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 64);
    }

    #[test]
    fn test_create_embedder_unknown_falls_back_to_mock() {
        let mut config = crate::config::AppConfig::default().embedding;
        config.provider = "something-else".to_string();
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.model_name(), "mock-embedding");
    }
}
