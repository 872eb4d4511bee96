//! ChatDock Common Library
//!
//! Shared code for the ChatDock services including:
//! - Tenant database models and repository
//! - Conversation store (DynamoDB)
//! - Embedding, chat-model, and vector-index clients
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics helpers

pub mod auth;
pub mod config;
pub mod convo;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod vector;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::Repository;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use llm::ChatModel;
pub use vector::VectorIndex;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Build the vector-index namespace for a tenant
pub fn tenant_namespace(organization_id: uuid::Uuid) -> String {
    format!("tenant_{}", organization_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_namespace() {
        let id = uuid::Uuid::nil();
        assert_eq!(
            tenant_namespace(id),
            "tenant_00000000-0000-0000-0000-000000000000"
        );
    }
}
