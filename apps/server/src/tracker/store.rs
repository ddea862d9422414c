//! Persistence seam for executions.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Execution, ExecutionKey};

/// Row store behind the execution tracker.
///
/// Implementations: [`crate::db::DbPool`] (PostgreSQL) and
/// [`super::InMemoryExecutionStore`].
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Short name used in logs.
    fn backend_tag(&self) -> &'static str;

    /// The execution stored for `key`, if any.
    async fn find_execution(&self, key: &ExecutionKey) -> AppResult<Option<Execution>>;

    /// Stored executions for any of `test_case_ids` within `session_id`.
    async fn list_executions(
        &self,
        test_case_ids: &[Uuid],
        session_id: Option<Uuid>,
    ) -> AppResult<Vec<Execution>>;

    /// Insert the first row for a key. Returns the stored row (id assigned, version 1).
    ///
    /// Fails with `Conflict` when a row for the key already exists.
    async fn insert_execution(&self, execution: &Execution) -> AppResult<Execution>;

    /// Overwrite an existing row if its version still equals `expected_version`.
    ///
    /// Fails with `Conflict` on a stale version and `NotFound` when the row is gone.
    async fn update_execution(
        &self,
        execution: &Execution,
        expected_version: i32,
    ) -> AppResult<Execution>;

    /// Step numbers of a test case, `None` when the test case does not exist.
    async fn step_numbers(&self, test_case_id: Uuid) -> AppResult<Option<Vec<i32>>>;
}
