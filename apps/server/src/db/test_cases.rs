//! Database queries for test cases.

use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::entity::test_case::{self, ActiveModel as TestCaseActiveModel, Entity as TestCaseEntity};
use crate::error::{AppError, AppResult};
use crate::models::test_case::{steps_from_json, steps_to_json};
use crate::models::{
    CreateTestCaseRequest, PaginationParams, Priority, QueryTestCasesParams, TestCase,
    TestCaseStatus, UpdateTestCaseRequest,
};

use super::DbPool;

/// Convert a database row to the domain test case.
fn to_test_case(model: test_case::Model) -> AppResult<TestCase> {
    let priority = Priority::parse(&model.priority).ok_or_else(|| {
        AppError::Database(format!(
            "Test case {} has unknown priority '{}'",
            model.id, model.priority
        ))
    })?;
    let status = TestCaseStatus::parse(&model.status).ok_or_else(|| {
        AppError::Database(format!(
            "Test case {} has unknown status '{}'",
            model.id, model.status
        ))
    })?;

    Ok(TestCase {
        id: model.id,
        project_id: model.project_id,
        title: model.title,
        description: model.description,
        test_type: model.test_type,
        priority,
        steps: steps_from_json(&model.steps)?,
        preconditions: model.preconditions,
        expected_result: model.expected_result,
        status,
        created_by: model.created_by,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

async fn insert_one<C: ConnectionTrait>(
    conn: &C,
    request: CreateTestCaseRequest,
    created_by: &str,
) -> AppResult<TestCase> {
    let now = Utc::now();
    let model = TestCaseActiveModel {
        id: Set(Uuid::now_v7()),
        project_id: Set(request.project_id),
        title: Set(request.title.trim().to_string()),
        description: Set(request.description),
        test_type: Set(request.test_type),
        priority: Set(request.priority.as_str().to_string()),
        steps: Set(steps_to_json(&request.steps)?),
        preconditions: Set(request.preconditions),
        expected_result: Set(request.expected_result),
        status: Set(request.status.as_str().to_string()),
        created_by: Set(Some(created_by.to_string())),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let inserted = model
        .insert(conn)
        .await
        .map_err(|e| AppError::Database(format!("Failed to insert test case: {}", e)))?;

    to_test_case(inserted)
}

impl DbPool {
    /// Insert a validated test case.
    pub async fn insert_test_case(
        &self,
        request: CreateTestCaseRequest,
        created_by: &str,
    ) -> AppResult<TestCase> {
        insert_one(self.connection(), request, created_by).await
    }

    /// Insert several validated test cases; all or nothing.
    pub async fn insert_test_cases(
        &self,
        requests: Vec<CreateTestCaseRequest>,
        created_by: &str,
    ) -> AppResult<Vec<TestCase>> {
        let txn = self
            .connection()
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let mut created = Vec::with_capacity(requests.len());
        for request in requests {
            created.push(insert_one(&txn, request, created_by).await?);
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit test cases: {}", e)))?;

        Ok(created)
    }

    /// Get a single test case by ID.
    pub async fn get_test_case(&self, id: Uuid) -> AppResult<Option<TestCase>> {
        let row = TestCaseEntity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get test case: {}", e)))?;

        row.map(to_test_case).transpose()
    }

    /// Query test cases with pagination. Archived cases only show when asked for.
    pub async fn query_test_cases(
        &self,
        query: &QueryTestCasesParams,
    ) -> AppResult<(Vec<TestCase>, u64)> {
        let mut select = TestCaseEntity::find();

        if let Some(project_id) = query.project_id {
            select = select.filter(test_case::Column::ProjectId.eq(project_id));
        }

        select = match query.status {
            Some(status) => select.filter(test_case::Column::Status.eq(status.as_str())),
            None => select.filter(
                test_case::Column::Status.ne(TestCaseStatus::Archived.as_str()),
            ),
        };

        if let Some(priority) = query.priority {
            select = select.filter(test_case::Column::Priority.eq(priority.as_str()));
        }

        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            select = select
                .filter(Expr::col((test_case::Entity, test_case::Column::Title)).ilike(&pattern));
        }

        // Count total before pagination
        let total = select
            .clone()
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count test cases: {}", e)))?;

        let pagination = PaginationParams {
            page: query.page,
            limit: query.limit,
        };

        let rows = select
            .order_by_desc(test_case::Column::CreatedAt)
            .offset(pagination.offset() as u64)
            .limit(pagination.clamped_limit() as u64)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to query test cases: {}", e)))?;

        let cases = rows
            .into_iter()
            .map(to_test_case)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((cases, total))
    }

    /// Apply a validated update. Absent fields are left untouched.
    pub async fn update_test_case(
        &self,
        id: Uuid,
        request: UpdateTestCaseRequest,
    ) -> AppResult<TestCase> {
        let existing = TestCaseEntity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get test case: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("Test case {}", id)))?;

        let mut model: TestCaseActiveModel = existing.into();
        if let Some(title) = request.title {
            model.title = Set(title.trim().to_string());
        }
        if let Some(description) = request.description {
            model.description = Set(Some(description));
        }
        if let Some(test_type) = request.test_type {
            model.test_type = Set(test_type);
        }
        if let Some(priority) = request.priority {
            model.priority = Set(priority.as_str().to_string());
        }
        if let Some(steps) = request.steps {
            model.steps = Set(steps_to_json(&steps)?);
        }
        if let Some(preconditions) = request.preconditions {
            model.preconditions = Set(Some(preconditions));
        }
        if let Some(expected_result) = request.expected_result {
            model.expected_result = Set(Some(expected_result));
        }
        if let Some(status) = request.status {
            model.status = Set(status.as_str().to_string());
        }
        model.updated_at = Set(Utc::now());

        let updated = model
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update test case: {}", e)))?;

        to_test_case(updated)
    }

    /// Archive a test case. Its executions are kept.
    pub async fn archive_test_case(&self, id: Uuid) -> AppResult<TestCase> {
        self.update_test_case(
            id,
            UpdateTestCaseRequest {
                status: Some(TestCaseStatus::Archived),
                ..UpdateTestCaseRequest::default()
            },
        )
        .await
    }
}
