//! In-memory execution store for tests and local runs without PostgreSQL.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::ExecutionStore;
use crate::error::{AppError, AppResult};
use crate::models::{Execution, ExecutionKey};

#[derive(Default)]
pub struct InMemoryExecutionStore {
    executions: Mutex<HashMap<ExecutionKey, Execution>>,
    steps: Mutex<HashMap<Uuid, Vec<i32>>>,
    fail_writes: AtomicBool,
    write_calls: AtomicU64,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a test case with steps numbered 1..=step_count.
    pub async fn add_test_case(&self, test_case_id: Uuid, step_count: i32) {
        self.steps
            .lock()
            .await
            .insert(test_case_id, (1..=step_count).collect());
    }

    /// Make every subsequent insert/update fail with a database error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of insert/update calls received, failed ones included.
    pub fn write_calls(&self) -> u64 {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Current stored row, bypassing any tracker cache.
    pub async fn stored(&self, key: &ExecutionKey) -> Option<Execution> {
        self.executions.lock().await.get(key).cloned()
    }

    /// Replace a stored row as another writer would, bumping its version.
    pub async fn overwrite(&self, mut execution: Execution) -> Execution {
        let mut executions = self.executions.lock().await;
        let key = execution.key();
        let version = executions.get(&key).map(|e| e.version).unwrap_or(0);
        execution.id = execution
            .id
            .or_else(|| executions.get(&key).and_then(|e| e.id))
            .or_else(|| Some(Uuid::now_v7()));
        execution.version = version + 1;
        executions.insert(key, execution.clone());
        execution
    }

    fn begin_write(&self) -> AppResult<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database("simulated write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn find_execution(&self, key: &ExecutionKey) -> AppResult<Option<Execution>> {
        Ok(self.executions.lock().await.get(key).cloned())
    }

    async fn list_executions(
        &self,
        test_case_ids: &[Uuid],
        session_id: Option<Uuid>,
    ) -> AppResult<Vec<Execution>> {
        let executions = self.executions.lock().await;
        Ok(test_case_ids
            .iter()
            .filter_map(|id| executions.get(&ExecutionKey::new(*id, session_id)))
            .cloned()
            .collect())
    }

    async fn insert_execution(&self, execution: &Execution) -> AppResult<Execution> {
        self.begin_write()?;
        let mut executions = self.executions.lock().await;
        let key = execution.key();
        if executions.contains_key(&key) {
            return Err(AppError::Conflict(format!(
                "An execution for {} already exists",
                key
            )));
        }

        let mut stored = execution.clone();
        stored.id = Some(Uuid::now_v7());
        stored.version = 1;
        executions.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update_execution(
        &self,
        execution: &Execution,
        expected_version: i32,
    ) -> AppResult<Execution> {
        self.begin_write()?;
        let mut executions = self.executions.lock().await;
        let key = execution.key();
        let existing = executions
            .get(&key)
            .filter(|e| e.id.is_some() && e.id == execution.id)
            .ok_or_else(|| AppError::NotFound(format!("Execution {}", key)))?;

        if existing.version != expected_version {
            return Err(AppError::Conflict(format!(
                "Execution {} was modified (version {} != {})",
                key, existing.version, expected_version
            )));
        }

        let mut stored = execution.clone();
        stored.version = expected_version + 1;
        executions.insert(key, stored.clone());
        Ok(stored)
    }

    async fn step_numbers(&self, test_case_id: Uuid) -> AppResult<Option<Vec<i32>>> {
        Ok(self.steps.lock().await.get(&test_case_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_assigns_identity_and_rejects_duplicates() {
        let store = InMemoryExecutionStore::new();
        let key = ExecutionKey::unscoped(Uuid::now_v7());

        let stored = store.insert_execution(&Execution::not_run(key)).await.unwrap();
        assert!(stored.id.is_some());
        assert_eq!(stored.version, 1);

        let err = store
            .insert_execution(&Execution::not_run(key))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_checks_version() {
        let store = InMemoryExecutionStore::new();
        let key = ExecutionKey::new(Uuid::now_v7(), Some(Uuid::now_v7()));
        let stored = store.insert_execution(&Execution::not_run(key)).await.unwrap();

        let updated = store.update_execution(&stored, 1).await.unwrap();
        assert_eq!(updated.version, 2);

        let err = store.update_execution(&stored, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_scoped_and_unscoped_rows_are_distinct() {
        let store = InMemoryExecutionStore::new();
        let test_case_id = Uuid::now_v7();
        let session_id = Uuid::now_v7();

        store
            .insert_execution(&Execution::not_run(ExecutionKey::unscoped(test_case_id)))
            .await
            .unwrap();

        let scoped = store
            .list_executions(&[test_case_id], Some(session_id))
            .await
            .unwrap();
        assert!(scoped.is_empty());

        let unscoped = store.list_executions(&[test_case_id], None).await.unwrap();
        assert_eq!(unscoped.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let store = InMemoryExecutionStore::new();
        store.set_fail_writes(true);
        let key = ExecutionKey::unscoped(Uuid::now_v7());

        let err = store
            .insert_execution(&Execution::not_run(key))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(store.write_calls(), 1);
        assert!(store.stored(&key).await.is_none());
    }
}
