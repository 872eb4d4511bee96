//! Usage metrics entity
//!
//! Append-only ledger: each event writes its own dated row with exactly one
//! counter family set. Totals are summed client-side.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The counter family a usage event belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Query,
    Token,
    Embedding,
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(MetricKind::Query),
            "token" => Ok(MetricKind::Token),
            "embedding" => Ok(MetricKind::Embedding),
            other => Err(format!("unknown metric type: {}", other)),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetricKind::Query => "query",
            MetricKind::Token => "token",
            MetricKind::Embedding => "embedding",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "usage_metrics")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub organization_id: Uuid,

    pub date: DateTimeWithTimeZone,

    pub query_count: i32,

    pub token_count: i32,

    pub embedding_count: i32,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub extra_metadata: Option<serde_json::Value>,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_kind_parse() {
        assert_eq!("query".parse::<MetricKind>().unwrap(), MetricKind::Query);
        assert_eq!("token".parse::<MetricKind>().unwrap(), MetricKind::Token);
        assert_eq!(
            "embedding".parse::<MetricKind>().unwrap(),
            MetricKind::Embedding
        );
        assert!("latency".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_metric_kind_display_roundtrip() {
        for kind in [MetricKind::Query, MetricKind::Token, MetricKind::Embedding] {
            assert_eq!(kind.to_string().parse::<MetricKind>().unwrap(), kind);
        }
    }
}
