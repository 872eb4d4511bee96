//! Ingestion error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParse { path: String, message: String },

    #[error("Invalid document {path}: {message}")]
    InvalidDocument { path: String, message: String },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector index error: {0}")]
    VectorIndex(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<chatdock_common::errors::AppError> for IngestionError {
    fn from(e: chatdock_common::errors::AppError) -> Self {
        match e {
            chatdock_common::errors::AppError::EmbeddingError { message } => {
                IngestionError::Embedding(message)
            }
            chatdock_common::errors::AppError::VectorIndexError { message } => {
                IngestionError::VectorIndex(message)
            }
            other => IngestionError::Config(other.to_string()),
        }
    }
}
