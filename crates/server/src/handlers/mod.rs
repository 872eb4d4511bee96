//! HTTP request handlers

pub mod conversations;
pub mod health;
pub mod knowledge_bases;
pub mod organizations;
pub mod usage_metrics;
pub mod webhook;
pub mod whatsapp_users;
