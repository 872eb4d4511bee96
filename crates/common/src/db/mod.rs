//! Relational database layer
//!
//! Provides:
//! - SeaORM entity models
//! - Repository pattern for data access
//! - Connection pool management
//! - Startup schema bootstrap

pub mod models;
mod repository;

pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper, created once at startup and shared
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(true);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self { conn })
    }

    /// Get the shared connection
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;

        Ok(())
    }

    /// Create the tenant-configuration tables when missing.
    ///
    /// There is no migration tool in-tree; the schema is small and append-only.
    pub async fn init_schema(&self) -> Result<()> {
        const SCHEMA: &[&str] = &[
            r#"
            CREATE TABLE IF NOT EXISTS organizations (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                api_key TEXT NOT NULL UNIQUE,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                settings JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS whatsapp_users (
                phone_number TEXT PRIMARY KEY,
                organization_id UUID NOT NULL REFERENCES organizations(id),
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                settings JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                last_active TIMESTAMPTZ
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS knowledge_bases (
                id UUID PRIMARY KEY,
                organization_id UUID NOT NULL REFERENCES organizations(id),
                name TEXT NOT NULL,
                description TEXT,
                vector_store_ids JSONB,
                extra_metadata JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS usage_metrics (
                id UUID PRIMARY KEY,
                organization_id UUID NOT NULL REFERENCES organizations(id),
                date TIMESTAMPTZ NOT NULL,
                query_count INTEGER NOT NULL DEFAULT 0,
                token_count INTEGER NOT NULL DEFAULT 0,
                embedding_count INTEGER NOT NULL DEFAULT 0,
                extra_metadata JSONB
            )
            "#,
        ];

        for stmt in SCHEMA {
            self.conn.execute_unprepared(stmt).await?;
        }

        info!("Relational schema ready");
        Ok(())
    }
}
