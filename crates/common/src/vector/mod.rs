//! Vector index abstraction
//!
//! Every operation is scoped to a namespace; tenants never share one. The
//! Pinecone client speaks the index data-plane API over HTTP; the in-memory
//! index backs unit tests with exact cosine similarity.

use crate::config::VectorConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// A vector to store
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// One similarity-query result
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl VectorMatch {
    /// The stored source text, when ingestion recorded one
    pub fn text(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("text"))
            .and_then(|t| t.as_str())
    }
}

/// Trait for namespace-scoped vector storage and similarity search
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Upsert a batch of vectors into a namespace
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()>;

    /// Top-k similarity query within a namespace, metadata included
    async fn query(&self, namespace: &str, vector: &[f32], top_k: usize)
        -> Result<Vec<VectorMatch>>;

    /// Delete every vector in a namespace
    async fn delete_all(&self, namespace: &str) -> Result<()>;
}

/// Pinecone data-plane client
pub struct PineconeIndex {
    client: reqwest::Client,
    api_key: String,
    index_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    namespace: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    delete_all: bool,
    namespace: &'a str,
}

impl PineconeIndex {
    /// Create a new Pinecone client from configuration
    pub fn new(config: &VectorConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::Configuration {
                message: "vector.api_key is required for the pinecone provider".to_string(),
            })?;

        let index_url = config
            .index_url
            .clone()
            .ok_or_else(|| AppError::Configuration {
                message: "vector.index_url is required for the pinecone provider".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            index_url: index_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.index_url, path);

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::VectorIndexError {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::VectorIndexError {
                message: format!("API error {}: {}", status, body),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let request = UpsertRequest {
            vectors: records,
            namespace,
        };
        self.post("/vectors/upsert", &request).await?;
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            namespace,
        };

        let response = self.post("/query", &request).await?;
        let result: QueryResponse =
            response
                .json()
                .await
                .map_err(|e| AppError::VectorIndexError {
                    message: format!("Failed to parse response: {}", e),
                })?;

        Ok(result.matches)
    }

    async fn delete_all(&self, namespace: &str) -> Result<()> {
        let request = DeleteRequest {
            delete_all: true,
            namespace,
        };
        self.post("/vectors/delete", &request).await?;
        Ok(())
    }
}

/// In-memory vector index for tests, exact cosine similarity
#[derive(Default)]
pub struct MemoryIndex {
    namespaces: RwLock<HashMap<String, Vec<VectorRecord>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        let stored = namespaces.entry(namespace.to_string()).or_default();

        for record in records {
            if let Some(existing) = stored.iter_mut().find(|r| r.id == record.id) {
                *existing = record.clone();
            } else {
                stored.push(record.clone());
            }
        }

        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>> {
        let namespaces = self.namespaces.read().await;

        let mut matches: Vec<VectorMatch> = namespaces
            .get(namespace)
            .map(|records| {
                records
                    .iter()
                    .map(|r| VectorMatch {
                        id: r.id.clone(),
                        score: cosine_similarity(&r.values, vector),
                        metadata: r.metadata.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);

        Ok(matches)
    }

    async fn delete_all(&self, namespace: &str) -> Result<()> {
        self.namespaces.write().await.remove(namespace);
        Ok(())
    }
}

/// Create a vector index based on configuration
pub fn create_vector_index(config: &VectorConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.provider.as_str() {
        "pinecone" => Ok(Arc::new(PineconeIndex::new(config)?)),
        "memory" => Ok(Arc::new(MemoryIndex::new())),
        other => {
            tracing::warn!(provider = other, "Unknown vector provider, using memory");
            Ok(Arc::new(MemoryIndex::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, values: Vec<f32>, text: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values,
            metadata: Some(json!({ "text": text })),
        }
    }

    #[tokio::test]
    async fn test_memory_index_ranks_by_similarity() {
        let index = MemoryIndex::new();
        index
            .upsert(
                "tenant_a",
                &[
                    record("1", vec![1.0, 0.0], "exact"),
                    record("2", vec![0.0, 1.0], "orthogonal"),
                    record("3", vec![0.7, 0.7], "diagonal"),
                ],
            )
            .await
            .unwrap();

        let matches = index.query("tenant_a", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "1");
        assert_eq!(matches[0].text(), Some("exact"));
        assert_eq!(matches[1].id, "3");
    }

    #[tokio::test]
    async fn test_memory_index_namespace_isolation() {
        let index = MemoryIndex::new();
        index
            .upsert("tenant_a", &[record("1", vec![1.0, 0.0], "a")])
            .await
            .unwrap();

        let matches = index.query("tenant_b", &[1.0, 0.0], 4).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_memory_index_delete_all() {
        let index = MemoryIndex::new();
        index
            .upsert("tenant_a", &[record("1", vec![1.0, 0.0], "a")])
            .await
            .unwrap();

        index.delete_all("tenant_a").await.unwrap();
        let matches = index.query("tenant_a", &[1.0, 0.0], 4).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_memory_index_upsert_replaces_by_id() {
        let index = MemoryIndex::new();
        index
            .upsert("tenant_a", &[record("1", vec![1.0, 0.0], "old")])
            .await
            .unwrap();
        index
            .upsert("tenant_a", &[record("1", vec![1.0, 0.0], "new")])
            .await
            .unwrap();

        let matches = index.query("tenant_a", &[1.0, 0.0], 4).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].text(), Some("new"));
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
