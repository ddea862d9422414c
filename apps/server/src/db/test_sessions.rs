//! Database queries for test run sessions.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use uuid::Uuid;

use crate::entity::test_run_session::{
    self, ActiveModel as SessionActiveModel, Entity as SessionEntity,
};
use crate::error::{AppError, AppResult};
use crate::models::{CreateSessionRequest, QuerySessionsParams, SessionStatus, TestSession};

use super::DbPool;

const DEFAULT_SESSION_LIMIT: u64 = 50;
const MAX_SESSION_LIMIT: u64 = 200;

fn to_session(model: test_run_session::Model) -> AppResult<TestSession> {
    let status = SessionStatus::parse(&model.status).ok_or_else(|| {
        AppError::Database(format!(
            "Session {} has unknown status '{}'",
            model.id, model.status
        ))
    })?;

    Ok(TestSession {
        id: model.id,
        name: model.name,
        status,
        environment: model.environment,
        started_at: model.started_at,
        completed_at: model.completed_at,
        created_by: model.created_by,
        created_at: model.created_at,
    })
}

impl DbPool {
    /// Open a new active session.
    pub async fn insert_session(
        &self,
        request: CreateSessionRequest,
        created_by: &str,
    ) -> AppResult<TestSession> {
        let now = Utc::now();
        let model = SessionActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(request.name.trim().to_string()),
            status: Set(SessionStatus::Active.as_str().to_string()),
            environment: Set(request.environment),
            started_at: Set(now),
            completed_at: Set(None),
            created_by: Set(Some(created_by.to_string())),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert session: {}", e)))?;

        to_session(inserted)
    }

    pub async fn get_session(&self, id: Uuid) -> AppResult<Option<TestSession>> {
        let row = SessionEntity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get session: {}", e)))?;

        row.map(to_session).transpose()
    }

    /// Most recent sessions first.
    pub async fn list_sessions(&self, query: &QuerySessionsParams) -> AppResult<Vec<TestSession>> {
        let mut select = SessionEntity::find();
        if let Some(status) = query.status {
            select = select.filter(test_run_session::Column::Status.eq(status.as_str()));
        }

        let limit = query
            .limit
            .unwrap_or(DEFAULT_SESSION_LIMIT)
            .clamp(1, MAX_SESSION_LIMIT);

        let rows = select
            .order_by_desc(test_run_session::Column::CreatedAt)
            .limit(limit)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list sessions: {}", e)))?;

        rows.into_iter().map(to_session).collect()
    }

    /// Change a session's status. Closing a session stamps `completed_at`;
    /// reopening clears it.
    pub async fn update_session_status(
        &self,
        id: Uuid,
        status: SessionStatus,
    ) -> AppResult<TestSession> {
        let existing = SessionEntity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get session: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("Session {}", id)))?;

        let completed_at = match (status.is_closed(), existing.completed_at) {
            (true, Some(at)) => Some(at),
            (true, None) => Some(Utc::now()),
            (false, _) => None,
        };

        let mut model: SessionActiveModel = existing.into();
        model.status = Set(status.as_str().to_string());
        model.completed_at = Set(completed_at);
        model.updated_at = Set(Utc::now());

        let updated = model
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update session: {}", e)))?;

        to_session(updated)
    }
}
