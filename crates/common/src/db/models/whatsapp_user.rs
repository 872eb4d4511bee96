//! Registered WhatsApp end-user entity
//!
//! phone_number is the primary key and therefore unique across ALL tenants.
//! Business logic implies per-tenant registration; keeping the stored schema
//! until product confirms otherwise.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "whatsapp_users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub phone_number: String,

    pub organization_id: Uuid,

    pub is_active: bool,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub settings: Option<serde_json::Value>,

    pub created_at: DateTimeWithTimeZone,

    pub last_active: Option<DateTimeWithTimeZone>,
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
