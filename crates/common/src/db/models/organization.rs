//! Organization entity - the tenancy root

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "organizations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text", unique)]
    pub api_key: String,

    pub is_active: bool,

    /// Free-form per-tenant settings (answer_mode, whatsapp_phone_number, ...)
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub settings: Option<serde_json::Value>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Read a string field out of the settings map
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.as_ref()?.get(key)?.as_str()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::whatsapp_user::Entity")]
    WhatsAppUsers,

    #[sea_orm(has_many = "super::knowledge_base::Entity")]
    KnowledgeBases,

    #[sea_orm(has_many = "super::usage_metric::Entity")]
    UsageMetrics,
}

impl Related<super::whatsapp_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WhatsAppUsers.def()
    }
}

impl Related<super::knowledge_base::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::KnowledgeBases.def()
    }
}

impl Related<super::usage_metric::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UsageMetrics.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
