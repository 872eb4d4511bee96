//! Ingestion processor
//!
//! Embeds document chunks in batches and upserts them into the tenant's
//! vector namespace. A failed batch is logged and skipped; ingestion is
//! partial rather than transactional, and re-runs always mint fresh vector
//! ids.

use crate::errors::IngestionError;
use crate::loader::DocumentChunk;
use chatdock_common::embeddings::Embedder;
use chatdock_common::metrics;
use chatdock_common::tenant_namespace;
use chatdock_common::vector::{VectorIndex, VectorRecord};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Outcome of one ingestion run
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub upserted: usize,
    pub failed: usize,
}

pub struct IngestionProcessor {
    embedder: Arc<dyn Embedder>,
    vectors: Arc<dyn VectorIndex>,
    batch_size: usize,
}

impl IngestionProcessor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vectors: Arc<dyn VectorIndex>,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            vectors,
            batch_size: batch_size.max(1),
        }
    }

    /// Embed and upsert all chunks into the organization's namespace
    pub async fn ingest(
        &self,
        organization_id: Uuid,
        chunks: &[DocumentChunk],
    ) -> Result<IngestReport, IngestionError> {
        let namespace = tenant_namespace(organization_id);
        let mut report = IngestReport::default();

        for (batch_number, batch) in chunks.chunks(self.batch_size).enumerate() {
            let base_index = batch_number * self.batch_size;
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

            let embeddings = match self.embedder.embed_batch(&texts).await {
                Ok(embeddings) => {
                    metrics::record_embedding(self.embedder.model_name(), texts.len(), true);
                    embeddings
                }
                Err(e) => {
                    metrics::record_embedding(self.embedder.model_name(), texts.len(), false);
                    error!(batch = batch_number, error = %e, "Embedding batch failed, skipping");
                    report.failed += batch.len();
                    continue;
                }
            };

            let records: Vec<VectorRecord> = batch
                .iter()
                .zip(embeddings)
                .enumerate()
                .map(|(offset, (chunk, values))| VectorRecord {
                    id: vector_id(base_index + offset),
                    values,
                    metadata: Some(chunk_metadata(chunk)),
                })
                .collect();

            match self.vectors.upsert(&namespace, &records).await {
                Ok(_) => {
                    metrics::record_ingestion(&namespace, records.len());
                    report.upserted += records.len();
                }
                Err(e) => {
                    error!(batch = batch_number, error = %e, "Upsert batch failed, skipping");
                    report.failed += batch.len();
                }
            }
        }

        info!(
            namespace,
            upserted = report.upserted,
            failed = report.failed,
            "Ingestion complete"
        );

        Ok(report)
    }

    /// Remove every vector in the organization's namespace
    pub async fn clear(&self, organization_id: Uuid) -> Result<(), IngestionError> {
        let namespace = tenant_namespace(organization_id);
        self.vectors.delete_all(&namespace).await?;
        info!(namespace, "Namespace cleared");
        Ok(())
    }
}

/// Vector id: the chunk's position plus 4 random bytes, so a re-ingestion
/// never collides with earlier runs.
fn vector_id(index: usize) -> String {
    let random_bytes: [u8; 4] = rand::random();
    format!("{}-{}", index, hex::encode(random_bytes))
}

fn chunk_metadata(chunk: &DocumentChunk) -> serde_json::Value {
    let mut metadata = json!({
        "text": chunk.text,
        "source": chunk.source,
    });
    if let Some(page) = chunk.page {
        metadata["page"] = json!(page);
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdock_common::embeddings::MockEmbedder;
    use chatdock_common::vector::MemoryIndex;

    fn chunk(text: &str) -> DocumentChunk {
        DocumentChunk {
            text: text.to_string(),
            source: "doc.pdf".to_string(),
            page: Some(1),
        }
    }

    fn processor(vectors: Arc<dyn VectorIndex>) -> IngestionProcessor {
        IngestionProcessor::new(Arc::new(MockEmbedder::new(64)), vectors, 100)
    }

    #[test]
    fn test_vector_id_format() {
        let id = vector_id(7);
        let (index, suffix) = id.split_once('-').unwrap();
        assert_eq!(index, "7");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_vector_ids_fresh_per_run() {
        assert_ne!(vector_id(0), vector_id(0));
    }

    #[tokio::test]
    async fn test_ingest_and_query_roundtrip() {
        let org = Uuid::new_v4();
        let index: Arc<MemoryIndex> = Arc::new(MemoryIndex::new());
        let processor = processor(index.clone());

        let chunks = vec![chunk("shipping takes two days"), chunk("returns within 30 days")];
        let report = processor.ingest(org, &chunks).await.unwrap();
        assert_eq!(report.upserted, 2);
        assert_eq!(report.failed, 0);

        let embedder = MockEmbedder::new(64);
        let query = embedder.embed("shipping takes two days").await.unwrap();
        let matches = index
            .query(&tenant_namespace(org), &query, 4)
            .await
            .unwrap();
        assert_eq!(matches[0].text(), Some("shipping takes two days"));
        assert_eq!(
            matches[0].metadata.as_ref().unwrap()["source"],
            "doc.pdf"
        );
        assert_eq!(matches[0].metadata.as_ref().unwrap()["page"], 1);
    }

    #[tokio::test]
    async fn test_clear_empties_namespace() {
        let org = Uuid::new_v4();
        let index: Arc<MemoryIndex> = Arc::new(MemoryIndex::new());
        let processor = processor(index.clone());

        processor.ingest(org, &[chunk("content")]).await.unwrap();
        processor.clear(org).await.unwrap();

        let embedder = MockEmbedder::new(64);
        let query = embedder.embed("content").await.unwrap();
        let matches = index
            .query(&tenant_namespace(org), &query, 4)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }
}
