//! Run entity for SeaORM.

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "runs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: String,
    /// External run identifier, unique across all states.
    #[sea_orm(unique)]
    pub run_id: String,
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    pub environment: Option<String>,
    /// running, completed, passed, failed
    pub status: String,
    pub start_time: DateTimeUtc,
    pub end_time: Option<DateTimeUtc>,
    pub duration_ms: Option<i64>,
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: JsonValue,
    pub total_count: i32,
    pub passed_count: i32,
    pub failed_count: i32,
    pub skipped_count: i32,
    /// active, deleted
    pub state: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::suite::Entity")]
    Suites,
}

impl Related<super::suite::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Suites.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
