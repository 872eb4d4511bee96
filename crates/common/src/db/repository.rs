//! Repository pattern for tenant-configuration data access

use crate::auth::generate_api_key;
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Organization Operations
    // ========================================================================

    /// Create a new organization with a freshly generated API key
    pub async fn create_organization(
        &self,
        name: String,
        settings: Option<serde_json::Value>,
    ) -> Result<Organization> {
        let now = chrono::Utc::now();

        let org = OrganizationActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            api_key: Set(generate_api_key()),
            is_active: Set(true),
            settings: Set(settings),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        org.insert(self.conn()).await.map_err(Into::into)
    }

    /// Authenticate an organization by API key (exact match, active only).
    /// Fails with InvalidApiKey when absent or inactive.
    pub async fn authenticate_by_api_key(&self, api_key: &str) -> Result<Organization> {
        OrganizationEntity::find()
            .filter(OrganizationColumn::ApiKey.eq(api_key))
            .filter(OrganizationColumn::IsActive.eq(true))
            .one(self.conn())
            .await?
            .ok_or(AppError::InvalidApiKey)
    }

    // ========================================================================
    // WhatsApp User Operations
    // ========================================================================

    /// Register a WhatsApp end-user under an organization.
    ///
    /// phone_number is unique across ALL organizations (it is the primary
    /// key); a second registration of the same number fails regardless of
    /// which tenant owns the first one.
    pub async fn create_whatsapp_user(
        &self,
        organization_id: Uuid,
        phone_number: String,
        settings: Option<serde_json::Value>,
    ) -> Result<WhatsAppUser> {
        let existing = WhatsAppUserEntity::find()
            .filter(WhatsAppUserColumn::PhoneNumber.eq(phone_number.as_str()))
            .one(self.conn())
            .await?;

        if existing.is_some() {
            return Err(AppError::DuplicatePhoneNumber { phone_number });
        }

        let now = chrono::Utc::now();

        let user = WhatsAppUserActiveModel {
            phone_number: Set(phone_number),
            organization_id: Set(organization_id),
            is_active: Set(true),
            settings: Set(settings),
            created_at: Set(now.into()),
            last_active: Set(None),
        };

        user.insert(self.conn()).await.map_err(Into::into)
    }

    /// List WhatsApp users registered to one organization
    pub async fn list_whatsapp_users(&self, organization_id: Uuid) -> Result<Vec<WhatsAppUser>> {
        WhatsAppUserEntity::find()
            .filter(WhatsAppUserColumn::OrganizationId.eq(organization_id))
            .order_by_asc(WhatsAppUserColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Get a WhatsApp user scoped to one organization.
    /// Another tenant's number is indistinguishable from an absent one.
    pub async fn find_whatsapp_user(
        &self,
        organization_id: Uuid,
        phone_number: &str,
    ) -> Result<WhatsAppUser> {
        WhatsAppUserEntity::find()
            .filter(WhatsAppUserColumn::PhoneNumber.eq(phone_number))
            .filter(WhatsAppUserColumn::OrganizationId.eq(organization_id))
            .one(self.conn())
            .await?
            .ok_or_else(|| AppError::WhatsAppUserNotFound {
                phone_number: phone_number.to_string(),
            })
    }

    // ========================================================================
    // Knowledge Base Operations
    // ========================================================================

    /// Create a knowledge base record scoped to an organization
    pub async fn create_knowledge_base(
        &self,
        organization_id: Uuid,
        name: String,
        description: Option<String>,
        settings: Option<serde_json::Value>,
    ) -> Result<KnowledgeBase> {
        let now = chrono::Utc::now();

        let kb = KnowledgeBaseActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            name: Set(name),
            description: Set(description),
            vector_store_ids: Set(Some(serde_json::json!({
                "namespace": crate::tenant_namespace(organization_id),
            }))),
            extra_metadata: Set(settings),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        kb.insert(self.conn()).await.map_err(Into::into)
    }

    /// List knowledge bases for an organization
    pub async fn list_knowledge_bases(&self, organization_id: Uuid) -> Result<Vec<KnowledgeBase>> {
        KnowledgeBaseEntity::find()
            .filter(KnowledgeBaseColumn::OrganizationId.eq(organization_id))
            .order_by_asc(KnowledgeBaseColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Get a knowledge base by id with an ownership check.
    /// NotFound and cross-tenant access collapse into a single 404.
    pub async fn find_knowledge_base(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<KnowledgeBase> {
        KnowledgeBaseEntity::find_by_id(id)
            .filter(KnowledgeBaseColumn::OrganizationId.eq(organization_id))
            .one(self.conn())
            .await?
            .ok_or_else(|| AppError::KnowledgeBaseNotFound { id: id.to_string() })
    }

    // ========================================================================
    // Usage Ledger Operations
    // ========================================================================

    /// Record one usage event: a new dated row with only the matching counter
    /// set, the other counters zero. Append-only, no per-day aggregation.
    pub async fn record_usage(
        &self,
        organization_id: Uuid,
        kind: MetricKind,
        value: i32,
        extra_metadata: Option<serde_json::Value>,
    ) -> Result<UsageMetric> {
        let now = chrono::Utc::now();

        let (query, token, embedding) = match kind {
            MetricKind::Query => (value, 0, 0),
            MetricKind::Token => (0, value, 0),
            MetricKind::Embedding => (0, 0, value),
        };

        let metric = UsageMetricActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            date: Set(now.into()),
            query_count: Set(query),
            token_count: Set(token),
            embedding_count: Set(embedding),
            extra_metadata: Set(extra_metadata),
        };

        metric.insert(self.conn()).await.map_err(Into::into)
    }

    /// List all usage rows for an organization
    pub async fn list_usage(&self, organization_id: Uuid) -> Result<Vec<UsageMetric>> {
        UsageMetricEntity::find()
            .filter(UsageMetricColumn::OrganizationId.eq(organization_id))
            .order_by_asc(UsageMetricColumn::Date)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// List usage rows where the given counter is positive
    pub async fn list_usage_by_kind(
        &self,
        organization_id: Uuid,
        kind: MetricKind,
    ) -> Result<Vec<UsageMetric>> {
        let counter = match kind {
            MetricKind::Query => UsageMetricColumn::QueryCount,
            MetricKind::Token => UsageMetricColumn::TokenCount,
            MetricKind::Embedding => UsageMetricColumn::EmbeddingCount,
        };

        UsageMetricEntity::find()
            .filter(UsageMetricColumn::OrganizationId.eq(organization_id))
            .filter(counter.gt(0))
            .order_by_asc(UsageMetricColumn::Date)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }
}
