//! TestCase entity for SeaORM.

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "test_cases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub test_type: String,
    pub priority: String,
    /// Ordered steps: [{step_number, action, expected}]
    #[sea_orm(column_type = "JsonBinary")]
    pub steps: JsonValue,
    #[sea_orm(column_type = "Text", nullable)]
    pub preconditions: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub expected_result: Option<String>,
    pub status: String,
    pub created_by: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::test_execution::Entity")]
    Executions,
}

impl Related<super::test_execution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Executions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
