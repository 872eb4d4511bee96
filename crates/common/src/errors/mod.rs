//! Error types for ChatDock services
//!
//! Provides:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidFormat,

    // Authentication errors (2xxx)
    Unauthorized,
    InvalidApiKey,
    ExpiredToken,

    // Authorization errors (3xxx)
    Forbidden,
    TenantMismatch,
    InvalidVerifyToken,

    // Resource errors (4xxx)
    NotFound,
    ConversationNotFound,
    KnowledgeBaseNotFound,
    WhatsAppUserNotFound,

    // Conflict errors (5xxx)
    DuplicatePhoneNumber,

    // Database errors (6xxx)
    DatabaseError,
    ConnectionError,
    DocumentStoreError,

    // External service errors (7xxx)
    EmbeddingError,
    ChatModelError,
    VectorIndexError,
    TransportError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidFormat => 1002,

            ErrorCode::Unauthorized => 2001,
            ErrorCode::InvalidApiKey => 2002,
            ErrorCode::ExpiredToken => 2003,

            ErrorCode::Forbidden => 3001,
            ErrorCode::TenantMismatch => 3002,
            ErrorCode::InvalidVerifyToken => 3003,

            ErrorCode::NotFound => 4001,
            ErrorCode::ConversationNotFound => 4002,
            ErrorCode::KnowledgeBaseNotFound => 4003,
            ErrorCode::WhatsAppUserNotFound => 4004,

            ErrorCode::DuplicatePhoneNumber => 5001,

            ErrorCode::DatabaseError => 6001,
            ErrorCode::ConnectionError => 6002,
            ErrorCode::DocumentStoreError => 6003,

            ErrorCode::EmbeddingError => 7001,
            ErrorCode::ChatModelError => 7002,
            ErrorCode::VectorIndexError => 7003,
            ErrorCode::TransportError => 7004,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Authentication errors
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Token expired")]
    ExpiredToken,

    // Authorization errors
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Not authorized to access this conversation")]
    TenantMismatch,

    #[error("Invalid verification token")]
    InvalidVerifyToken,

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Conversation not found")]
    ConversationNotFound,

    #[error("Knowledge base not found: {id}")]
    KnowledgeBaseNotFound { id: String },

    #[error("WhatsApp user not found: {phone_number}")]
    WhatsAppUserNotFound { phone_number: String },

    // Conflict errors
    #[error("Phone number already registered")]
    DuplicatePhoneNumber { phone_number: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Document store error: {message}")]
    DocumentStore { message: String },

    // External service errors
    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Chat model error: {message}")]
    ChatModelError { message: String },

    #[error("Vector index error: {message}")]
    VectorIndexError { message: String },

    #[error("Messaging transport error: {message}")]
    TransportError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::Unauthenticated => ErrorCode::Unauthorized,
            AppError::InvalidApiKey => ErrorCode::InvalidApiKey,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::Forbidden { .. } => ErrorCode::Forbidden,
            AppError::TenantMismatch => ErrorCode::TenantMismatch,
            AppError::InvalidVerifyToken => ErrorCode::InvalidVerifyToken,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::ConversationNotFound => ErrorCode::ConversationNotFound,
            AppError::KnowledgeBaseNotFound { .. } => ErrorCode::KnowledgeBaseNotFound,
            AppError::WhatsAppUserNotFound { .. } => ErrorCode::WhatsAppUserNotFound,
            AppError::DuplicatePhoneNumber { .. } => ErrorCode::DuplicatePhoneNumber,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::DocumentStore { .. } => ErrorCode::DocumentStoreError,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::ChatModelError { .. } => ErrorCode::ChatModelError,
            AppError::VectorIndexError { .. } => ErrorCode::VectorIndexError,
            AppError::TransportError { .. } => ErrorCode::TransportError,
            AppError::HttpClient(_) => ErrorCode::TransportError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            // Duplicate phone registration is deliberately 400, not 409.
            AppError::Validation { .. }
            | AppError::InvalidFormat { .. }
            | AppError::DuplicatePhoneNumber { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthenticated | AppError::InvalidApiKey | AppError::ExpiredToken => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            AppError::Forbidden { .. }
            | AppError::TenantMismatch
            | AppError::InvalidVerifyToken => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::ConversationNotFound
            | AppError::KnowledgeBaseNotFound { .. }
            | AppError::WhatsAppUserNotFound { .. } => StatusCode::NOT_FOUND,

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::DocumentStore { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::EmbeddingError { .. }
            | AppError::ChatModelError { .. }
            | AppError::VectorIndexError { .. }
            | AppError::TransportError { .. }
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for the API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::ConversationNotFound;
        assert_eq!(err.code(), ErrorCode::ConversationNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unauthenticated_is_401() {
        assert_eq!(
            AppError::Unauthenticated.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::InvalidApiKey.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_duplicate_phone_is_400() {
        let err = AppError::DuplicatePhoneNumber {
            phone_number: "15550001111".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.is_client_error());
    }

    #[test]
    fn test_tenant_mismatch_is_403() {
        assert_eq!(
            AppError::TenantMismatch.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::InvalidVerifyToken.status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_server_error() {
        let err = AppError::Internal {
            message: "Something went wrong".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }
}
