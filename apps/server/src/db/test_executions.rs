//! Database queries for test executions.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, Set, SqlErr};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::entity::test_case::Entity as TestCaseEntity;
use crate::entity::test_execution::{
    self, ActiveModel as TestExecutionActiveModel, Entity as TestExecution,
};
use crate::error::{AppError, AppResult};
use crate::models::test_case::steps_from_json;
use crate::models::{Execution, ExecutionKey, ExecutionStatus, FailedStep};
use crate::tracker::ExecutionStore;

use super::DbPool;

/// Rows of one session scope; `None` selects unscoped rows.
fn session_filter(session_id: Option<Uuid>) -> Condition {
    match session_id {
        Some(id) => Condition::all().add(test_execution::Column::SessionId.eq(id)),
        None => Condition::all().add(test_execution::Column::SessionId.is_null()),
    }
}

fn completed_steps_json(steps: &BTreeSet<i32>) -> JsonValue {
    JsonValue::Array(steps.iter().map(|n| JsonValue::from(*n)).collect())
}

fn failed_steps_json(steps: &[FailedStep]) -> AppResult<JsonValue> {
    serde_json::to_value(steps)
        .map_err(|e| AppError::Database(format!("Failed to encode failed steps: {}", e)))
}

/// Convert a database row to the domain execution.
fn to_execution(model: test_execution::Model) -> AppResult<Execution> {
    let status = ExecutionStatus::parse(&model.status).ok_or_else(|| {
        AppError::Database(format!(
            "Execution {} has unknown status '{}'",
            model.id, model.status
        ))
    })?;
    let completed_steps: BTreeSet<i32> = serde_json::from_value(model.completed_steps)
        .map_err(|e| AppError::Database(format!("Corrupt completed_steps: {}", e)))?;
    let failed_steps: Vec<FailedStep> = serde_json::from_value(model.failed_steps)
        .map_err(|e| AppError::Database(format!("Corrupt failed_steps: {}", e)))?;

    Ok(Execution {
        id: Some(model.id),
        test_case_id: model.test_case_id,
        session_id: model.session_id,
        status,
        completed_steps,
        failed_steps,
        notes: model.notes,
        failure_reason: model.failure_reason,
        started_at: model.started_at,
        completed_at: model.completed_at,
        duration_minutes: model.duration_minutes,
        test_environment: model.test_environment,
        browser: model.browser,
        os_version: model.os_version,
        executed_by: model.executed_by,
        version: model.version,
    })
}

/// Mutable columns of an execution row.
fn state_columns(execution: &Execution) -> AppResult<TestExecutionActiveModel> {
    Ok(TestExecutionActiveModel {
        status: Set(execution.status.as_str().to_string()),
        completed_steps: Set(completed_steps_json(&execution.completed_steps)),
        failed_steps: Set(failed_steps_json(&execution.failed_steps)?),
        notes: Set(execution.notes.clone()),
        failure_reason: Set(execution.failure_reason.clone()),
        started_at: Set(execution.started_at),
        completed_at: Set(execution.completed_at),
        duration_minutes: Set(execution.duration_minutes),
        test_environment: Set(execution.test_environment.clone()),
        browser: Set(execution.browser.clone()),
        os_version: Set(execution.os_version.clone()),
        executed_by: Set(execution.executed_by.clone()),
        ..Default::default()
    })
}

#[async_trait]
impl ExecutionStore for DbPool {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn find_execution(&self, key: &ExecutionKey) -> AppResult<Option<Execution>> {
        let row = TestExecution::find()
            .filter(test_execution::Column::TestCaseId.eq(key.test_case_id))
            .filter(session_filter(key.session_id))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get execution: {}", e)))?;

        row.map(to_execution).transpose()
    }

    async fn list_executions(
        &self,
        test_case_ids: &[Uuid],
        session_id: Option<Uuid>,
    ) -> AppResult<Vec<Execution>> {
        if test_case_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = TestExecution::find()
            .filter(test_execution::Column::TestCaseId.is_in(test_case_ids.iter().copied()))
            .filter(session_filter(session_id))
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list executions: {}", e)))?;

        rows.into_iter().map(to_execution).collect()
    }

    async fn insert_execution(&self, execution: &Execution) -> AppResult<Execution> {
        let now = Utc::now();
        let mut model = state_columns(execution)?;
        model.id = Set(Uuid::now_v7());
        model.test_case_id = Set(execution.test_case_id);
        model.session_id = Set(execution.session_id);
        model.version = Set(1);
        model.created_at = Set(now);
        model.updated_at = Set(now);

        let inserted = model.insert(self.connection()).await.map_err(|e| {
            match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict(format!(
                    "An execution for {} already exists",
                    execution.key()
                )),
                Some(SqlErr::ForeignKeyConstraintViolation(_)) => AppError::NotFound(format!(
                    "Test case or session for execution {}",
                    execution.key()
                )),
                _ => AppError::Database(format!("Failed to insert execution: {}", e)),
            }
        })?;

        to_execution(inserted)
    }

    async fn update_execution(
        &self,
        execution: &Execution,
        expected_version: i32,
    ) -> AppResult<Execution> {
        let id = execution
            .id
            .ok_or_else(|| AppError::NotFound(format!("Execution {}", execution.key())))?;

        let mut model = state_columns(execution)?;
        model.version = Set(expected_version + 1);

        let result = TestExecution::update_many()
            .set(model)
            .filter(test_execution::Column::Id.eq(id))
            .filter(test_execution::Column::Version.eq(expected_version))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update execution: {}", e)))?;

        if result.rows_affected == 0 {
            let current = TestExecution::find_by_id(id)
                .one(self.connection())
                .await
                .map_err(|e| AppError::Database(format!("Failed to get execution: {}", e)))?;

            return Err(match current {
                Some(row) => AppError::Conflict(format!(
                    "Execution {} was modified (version {} != {})",
                    execution.key(),
                    row.version,
                    expected_version
                )),
                None => AppError::NotFound(format!("Execution {}", execution.key())),
            });
        }

        Ok(Execution {
            version: expected_version + 1,
            ..execution.clone()
        })
    }

    async fn step_numbers(&self, test_case_id: Uuid) -> AppResult<Option<Vec<i32>>> {
        let test_case = TestCaseEntity::find_by_id(test_case_id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get test case: {}", e)))?;

        test_case
            .map(|tc| -> AppResult<Vec<i32>> {
                let steps = steps_from_json(&tc.steps)?;
                Ok(steps.into_iter().map(|step| step.step_number).collect())
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(status: &str) -> test_execution::Model {
        let now = Utc::now();
        test_execution::Model {
            id: Uuid::now_v7(),
            test_case_id: Uuid::now_v7(),
            session_id: None,
            status: status.to_string(),
            completed_steps: json!([3, 1]),
            failed_steps: json!([{"step_number": 2, "failure_reason": "timeout"}]),
            notes: String::new(),
            failure_reason: String::new(),
            started_at: Some(now),
            completed_at: None,
            duration_minutes: None,
            test_environment: None,
            browser: Some("chrome".to_string()),
            os_version: None,
            executed_by: Some("qa-1".to_string()),
            version: 3,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_to_execution() {
        let model = row("in_progress");
        let id = model.id;
        let execution = to_execution(model).unwrap();

        assert_eq!(execution.id, Some(id));
        assert_eq!(execution.status, ExecutionStatus::InProgress);
        assert_eq!(execution.completed_steps, BTreeSet::from([1, 3]));
        assert_eq!(execution.failed_steps[0].failure_reason, "timeout");
        assert_eq!(execution.version, 3);
    }

    #[test]
    fn test_unknown_status_is_a_database_error() {
        let err = to_execution(row("done")).unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[test]
    fn test_completed_steps_serialize_sorted() {
        let steps = BTreeSet::from([5, 2, 9]);
        assert_eq!(completed_steps_json(&steps), json!([2, 5, 9]));
    }
}
