//! Spec entity for SeaORM.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "specs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub suite_id: Uuid,
    pub run_id: Uuid,
    pub name: String,
    /// passed, failed, skipped, pending
    pub status: String,
    pub sequence: i32,
    pub start_time: DateTimeUtc,
    pub end_time: DateTimeUtc,
    pub duration_ms: i64,
    pub error_message: Option<String>,
    pub stack_trace: Option<String>,
    pub retry_count: i32,
    pub is_flaky: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::suite::Entity",
        from = "Column::SuiteId",
        to = "super::suite::Column::Id",
        on_delete = "Cascade"
    )]
    Suite,
}

impl Related<super::suite::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Suite.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
