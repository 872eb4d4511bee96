//! SeaORM entity models
//!
//! Tenant-configuration entities for ChatDock

mod knowledge_base;
mod organization;
mod usage_metric;
mod whatsapp_user;

pub use organization::{
    ActiveModel as OrganizationActiveModel, Column as OrganizationColumn,
    Entity as OrganizationEntity, Model as Organization,
};

pub use whatsapp_user::{
    ActiveModel as WhatsAppUserActiveModel, Column as WhatsAppUserColumn,
    Entity as WhatsAppUserEntity, Model as WhatsAppUser,
};

pub use knowledge_base::{
    ActiveModel as KnowledgeBaseActiveModel, Column as KnowledgeBaseColumn,
    Entity as KnowledgeBaseEntity, Model as KnowledgeBase,
};

pub use usage_metric::{
    ActiveModel as UsageMetricActiveModel, Column as UsageMetricColumn,
    Entity as UsageMetricEntity, MetricKind, Model as UsageMetric,
};
