//! Execution tracker: per-test-case run state and its write-through persistence.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::clock::{Clock, SystemClock, duration_minutes};
use super::transition::{ExecutionEvent, TransitionRejected, transition};
use super::ExecutionStore;
use crate::config::TrackerSettings;
use crate::error::{AppError, AppResult};
use crate::models::{
    Execution, ExecutionDetails, ExecutionKey, ExecutionPatch, ExecutionStatus, FailedStep,
    Operator, Verdict,
};

/// Upper bound on cached in-progress runs; past it snapshots come from the store.
const CACHE_CAPACITY: usize = 4096;

/// Result of [`ExecutionTracker::mark_test_result`].
#[derive(Debug, Clone, PartialEq)]
pub enum MarkOutcome {
    /// The verdict was persisted.
    Saved(Execution),
    /// Nothing was persisted; collect details and call `save_execution_result`.
    DetailsRequired(Verdict),
}

/// One async lock per execution key, dropped from the map once nobody holds it.
#[derive(Default)]
struct KeyLocks {
    locks: StdMutex<HashMap<ExecutionKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    async fn acquire(&self, key: ExecutionKey) -> KeyGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(key).or_default().clone()
        };
        let guard = lock.clone().lock_owned().await;
        KeyGuard {
            locks: self,
            key,
            lock,
            guard: Some(guard),
        }
    }

    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: ExecutionKey,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.locks.lock().unwrap_or_else(|e| e.into_inner());
        // The map and this guard hold the only references: nobody is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}

/// Tracks executions for test cases and writes every change through to the store.
///
/// Operations on one key run one at a time; different keys proceed in
/// parallel. The cache keeps the last written snapshot of each in-progress
/// run. A change is computed from that snapshot, written to the store, and
/// only then recorded. Stale snapshots surface as `Conflict` and are evicted.
pub struct ExecutionTracker {
    store: Arc<dyn ExecutionStore>,
    clock: Arc<dyn Clock>,
    settings: TrackerSettings,
    key_locks: KeyLocks,
    cache: StdMutex<HashMap<ExecutionKey, Execution>>,
}

impl ExecutionTracker {
    pub fn new(store: Arc<dyn ExecutionStore>, settings: TrackerSettings) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), settings)
    }

    pub fn with_clock(
        store: Arc<dyn ExecutionStore>,
        clock: Arc<dyn Clock>,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            store,
            clock,
            settings,
            key_locks: KeyLocks::default(),
            cache: StdMutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ExecutionStore> {
        &self.store
    }

    pub fn settings(&self) -> TrackerSettings {
        self.settings
    }

    /// Number of cached snapshots.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of keys with an operation running or waiting.
    pub fn locked_len(&self) -> usize {
        self.key_locks.len()
    }

    /// Current execution for `key`, read from the store.
    ///
    /// A missing row reads as the `not_run` default.
    pub async fn execution(&self, key: ExecutionKey) -> AppResult<Execution> {
        let execution = self
            .store
            .find_execution(&key)
            .await?
            .unwrap_or_else(|| Execution::not_run(key));
        self.refresh(&execution);
        Ok(execution)
    }

    /// Executions for a set of test cases within one session, in request order.
    pub async fn executions(
        &self,
        test_case_ids: &[Uuid],
        session_id: Option<Uuid>,
    ) -> AppResult<Vec<Execution>> {
        let mut unique = Vec::with_capacity(test_case_ids.len());
        for id in test_case_ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }

        let mut stored: HashMap<Uuid, Execution> = self
            .store
            .list_executions(&unique, session_id)
            .await?
            .into_iter()
            .map(|e| (e.test_case_id, e))
            .collect();

        let executions: Vec<Execution> = unique
            .into_iter()
            .map(|id| {
                stored
                    .remove(&id)
                    .unwrap_or_else(|| Execution::not_run(ExecutionKey::new(id, session_id)))
            })
            .collect();

        for execution in &executions {
            self.refresh(execution);
        }
        Ok(executions)
    }

    /// Flip completion of one step, starting the run if needed.
    pub async fn toggle_step(
        &self,
        operator: &Operator,
        key: ExecutionKey,
        step_number: i32,
    ) -> AppResult<Execution> {
        let _guard = self.key_locks.acquire(key).await;
        self.ensure_step(key.test_case_id, step_number).await?;
        let current = self.snapshot(key).await?;

        let mut completed_steps = current.completed_steps.clone();
        let mut failed_steps = current.failed_steps.clone();
        if !completed_steps.remove(&step_number) {
            completed_steps.insert(step_number);
            failed_steps.retain(|f| f.step_number != step_number);
        }

        let patch = ExecutionPatch {
            completed_steps: Some(completed_steps),
            failed_steps: Some(failed_steps),
            ..ExecutionPatch::default()
        };
        self.apply(operator, current, Some(ExecutionEvent::StepToggled), patch)
            .await
    }

    /// Record a failed step with its reason, starting the run if needed.
    pub async fn fail_step(
        &self,
        operator: &Operator,
        key: ExecutionKey,
        step_number: i32,
        reason: &str,
    ) -> AppResult<Execution> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::InvalidInput(
                "A failure reason is required".to_string(),
            ));
        }

        let _guard = self.key_locks.acquire(key).await;
        self.ensure_step(key.test_case_id, step_number).await?;
        let current = self.snapshot(key).await?;

        let mut completed_steps: BTreeSet<i32> = current.completed_steps.clone();
        completed_steps.remove(&step_number);

        let mut failed_steps = current.failed_steps.clone();
        let failure = FailedStep {
            step_number,
            failure_reason: reason.to_string(),
        };
        match failed_steps
            .iter_mut()
            .find(|f| f.step_number == step_number)
        {
            Some(existing) => *existing = failure,
            None => failed_steps.push(failure),
        }

        let patch = ExecutionPatch {
            completed_steps: Some(completed_steps),
            failed_steps: Some(failed_steps),
            ..ExecutionPatch::default()
        };
        self.apply(operator, current, Some(ExecutionEvent::StepFailed), patch)
            .await
    }

    /// Record a verdict. `passed` is saved at once; every other verdict
    /// asks for details first and persists nothing.
    pub async fn mark_test_result(
        &self,
        operator: &Operator,
        key: ExecutionKey,
        verdict: Verdict,
    ) -> AppResult<MarkOutcome> {
        let _guard = self.key_locks.acquire(key).await;
        let current = self.snapshot(key).await?;
        transition(current.status, ExecutionEvent::Verdict(verdict))?;

        if verdict.requires_details() {
            if !current.is_persisted() {
                self.ensure_test_case(key.test_case_id).await?;
            }
            debug!(execution = %key, verdict = %verdict, "Verdict needs details before saving");
            return Ok(MarkOutcome::DetailsRequired(verdict));
        }

        let saved = self
            .save_result(operator, current, verdict, ExecutionDetails::default())
            .await?;
        Ok(MarkOutcome::Saved(saved))
    }

    /// Persist a verdict together with its details and duration.
    pub async fn save_execution_result(
        &self,
        operator: &Operator,
        key: ExecutionKey,
        verdict: Verdict,
        details: ExecutionDetails,
    ) -> AppResult<Execution> {
        let _guard = self.key_locks.acquire(key).await;
        let current = self.snapshot(key).await?;
        self.save_result(operator, current, verdict, details).await
    }

    /// Clear an execution back to `not_run`. Always permitted.
    pub async fn reset_test(&self, operator: &Operator, key: ExecutionKey) -> AppResult<Execution> {
        let _guard = self.key_locks.acquire(key).await;
        let current = self.snapshot(key).await?;
        let status = transition(current.status, ExecutionEvent::Reset)?;

        let mut next = current.cleared();
        next.status = status;

        if !current.is_persisted() {
            return Ok(next);
        }

        next.executed_by = Some(operator.id.clone());
        let saved = self.write(&current, next).await?;
        info!(
            execution = %key,
            previous = %current.status,
            operator = %operator,
            "Execution reset"
        );
        Ok(saved)
    }

    /// Merge a partial update onto the current execution and persist it.
    ///
    /// A status in the patch must be reachable from the current status;
    /// `not_run` is only reachable through [`Self::reset_test`].
    pub async fn save_execution_progress(
        &self,
        operator: &Operator,
        key: ExecutionKey,
        patch: ExecutionPatch,
    ) -> AppResult<Execution> {
        let event = patch
            .status
            .map(|target| ExecutionEvent::toward(target).ok_or(TransitionRejected::NotRunRequiresReset))
            .transpose()?;

        let _guard = self.key_locks.acquire(key).await;
        let current = self.snapshot(key).await?;
        self.apply(operator, current, event, patch).await
    }

    async fn save_result(
        &self,
        operator: &Operator,
        current: Execution,
        verdict: Verdict,
        details: ExecutionDetails,
    ) -> AppResult<Execution> {
        let now = self.clock.now();
        let duration = current.started_at.map(|started| duration_minutes(started, now));

        let patch = ExecutionPatch {
            duration_minutes: Some(duration),
            ..details.into_patch()
        };
        self.apply(
            operator,
            current,
            Some(ExecutionEvent::Verdict(verdict)),
            patch,
        )
        .await
    }

    /// Validate the status change, merge, stamp timestamps, then write.
    async fn apply(
        &self,
        operator: &Operator,
        current: Execution,
        event: Option<ExecutionEvent>,
        patch: ExecutionPatch,
    ) -> AppResult<Execution> {
        let status = match event {
            Some(event) => transition(current.status, event)?,
            None if current.status.is_terminal() => {
                return Err(TransitionRejected::Locked {
                    current: current.status,
                }
                .into());
            }
            None => current.status,
        };

        let now = self.clock.now();
        let mut next = ExecutionPatch {
            status: Some(status),
            ..patch
        }
        .apply(&current);

        // started_at is fixed by the first move into in_progress until a reset.
        next.started_at = match current.started_at {
            Some(started_at) => Some(started_at),
            None if status == ExecutionStatus::InProgress => next.started_at.or(Some(now)),
            None => next.started_at,
        };

        if status != current.status && self.settings.completion_stamp.stamps(status) {
            next.completed_at = Some(now);
        }

        next.executed_by = Some(operator.id.clone());
        let saved = self.write(&current, next).await?;

        info!(
            execution = %saved.key(),
            from = %current.status,
            to = %saved.status,
            completed_steps = saved.completed_steps.len(),
            failed_steps = saved.failed_steps.len(),
            version = saved.version,
            operator = %operator,
            "Execution saved"
        );
        Ok(saved)
    }

    /// Insert or version-checked update; the cache changes only on success.
    async fn write(&self, current: &Execution, next: Execution) -> AppResult<Execution> {
        let key = next.key();
        let result = if current.is_persisted() {
            self.store.update_execution(&next, current.version).await
        } else {
            self.ensure_test_case(key.test_case_id).await?;
            self.store.insert_execution(&next).await
        };

        match result {
            Ok(saved) => {
                self.remember(&saved);
                Ok(saved)
            }
            Err(AppError::Conflict(message)) => {
                self.forget(&key);
                warn!(
                    execution = %key,
                    backend = self.store.backend_tag(),
                    "Concurrent execution change detected: {}",
                    message
                );
                Err(AppError::Conflict(message))
            }
            Err(err) => {
                error!(
                    execution = %key,
                    backend = self.store.backend_tag(),
                    error = %err,
                    "Failed to save execution"
                );
                Err(err)
            }
        }
    }

    /// Last written execution for `key`, or a fresh read from the store.
    async fn snapshot(&self, key: ExecutionKey) -> AppResult<Execution> {
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned();
        if let Some(execution) = cached {
            return Ok(execution);
        }

        Ok(self
            .store
            .find_execution(&key)
            .await?
            .unwrap_or_else(|| Execution::not_run(key)))
    }

    /// Keep a written execution while its run is open; drop it once closed.
    fn remember(&self, execution: &Execution) {
        let key = execution.key();
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if execution.status != ExecutionStatus::InProgress {
            cache.remove(&key);
        } else if cache.len() < CACHE_CAPACITY || cache.contains_key(&key) {
            cache.insert(key, execution.clone());
        }
    }

    /// Replace a cached entry with a newer read; unknown keys stay uncached.
    fn refresh(&self, execution: &Execution) {
        let key = execution.key();
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let newer = cache
            .get(&key)
            .is_some_and(|cached| execution.version > cached.version);
        if !newer {
            return;
        }
        if execution.status == ExecutionStatus::InProgress {
            cache.insert(key, execution.clone());
        } else {
            cache.remove(&key);
        }
    }

    fn forget(&self, key: &ExecutionKey) {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    async fn ensure_test_case(&self, test_case_id: Uuid) -> AppResult<Vec<i32>> {
        self.store
            .step_numbers(test_case_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Test case {}", test_case_id)))
    }

    async fn ensure_step(&self, test_case_id: Uuid, step_number: i32) -> AppResult<()> {
        let steps = self.ensure_test_case(test_case_id).await?;
        if !steps.contains(&step_number) {
            return Err(AppError::InvalidInput(format!(
                "Step {} does not belong to test case {}",
                step_number, test_case_id
            )));
        }
        Ok(())
    }
}
