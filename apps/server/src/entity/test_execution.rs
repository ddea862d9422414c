//! TestExecution entity for SeaORM.

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "test_executions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub test_case_id: Uuid,
    pub session_id: Option<Uuid>,
    pub status: String,
    /// Sorted array of completed step numbers
    #[sea_orm(column_type = "JsonBinary")]
    pub completed_steps: JsonValue,
    /// [{step_number, failure_reason}]
    #[sea_orm(column_type = "JsonBinary")]
    pub failed_steps: JsonValue,
    #[sea_orm(column_type = "Text")]
    pub notes: String,
    #[sea_orm(column_type = "Text")]
    pub failure_reason: String,
    pub started_at: Option<DateTimeUtc>,
    pub completed_at: Option<DateTimeUtc>,
    pub duration_minutes: Option<i32>,
    pub test_environment: Option<String>,
    pub browser: Option<String>,
    pub os_version: Option<String>,
    pub executed_by: Option<String>,
    pub version: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::test_case::Entity",
        from = "Column::TestCaseId",
        to = "super::test_case::Column::Id",
        on_delete = "Cascade"
    )]
    TestCase,
    #[sea_orm(
        belongs_to = "super::test_run_session::Entity",
        from = "Column::SessionId",
        to = "super::test_run_session::Column::Id",
        on_delete = "Cascade"
    )]
    Session,
}

impl Related<super::test_case::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TestCase.def()
    }
}

impl Related<super::test_run_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
