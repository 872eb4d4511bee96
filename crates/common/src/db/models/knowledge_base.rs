//! Knowledge base metadata entity
//!
//! Metadata only; ingestion and retrieval are delegated to the vector index
//! through the `tenant_<organization_id>` namespace convention.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "knowledge_bases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub organization_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Vector-store namespace identifiers backing this knowledge base
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub vector_store_ids: Option<serde_json::Value>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub extra_metadata: Option<serde_json::Value>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id"
    )]
    Organization,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
