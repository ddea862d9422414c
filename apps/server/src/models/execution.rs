//! Execution domain models and DTOs.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Execution status of a test case within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// No interaction yet (also the reading of a missing row).
    #[default]
    NotRun,
    /// At least one step was checked off or failed.
    InProgress,
    Passed,
    Failed,
    Blocked,
    Skipped,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRun => "not_run",
            Self::InProgress => "in_progress",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
            Self::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_run" => Some(Self::NotRun),
            "in_progress" => Some(Self::InProgress),
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            "blocked" => Some(Self::Blocked),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Terminal statuses lock the result until a reset.
    pub fn is_terminal(&self) -> bool {
        self.verdict().is_some()
    }

    /// The verdict this status represents, if terminal.
    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            Self::Passed => Some(Verdict::Passed),
            Self::Failed => Some(Verdict::Failed),
            Self::Blocked => Some(Verdict::Blocked),
            Self::Skipped => Some(Verdict::Skipped),
            Self::NotRun | Self::InProgress => None,
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final result an operator can record for a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
    Blocked,
    Skipped,
}

impl Verdict {
    /// Map a keyboard shortcut (P/F/B/S, any case) to a verdict.
    pub fn from_shortcut(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'p' => Some(Self::Passed),
            'f' => Some(Self::Failed),
            'b' => Some(Self::Blocked),
            's' => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Verdicts other than `passed` must collect details before saving.
    pub fn requires_details(&self) -> bool {
        !matches!(self, Self::Passed)
    }

    pub fn status(&self) -> ExecutionStatus {
        match self {
            Self::Passed => ExecutionStatus::Passed,
            Self::Failed => ExecutionStatus::Failed,
            Self::Blocked => ExecutionStatus::Blocked,
            Self::Skipped => ExecutionStatus::Skipped,
        }
    }
}

impl From<Verdict> for ExecutionStatus {
    fn from(verdict: Verdict) -> Self {
        verdict.status()
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.status().as_str())
    }
}

/// Identity of an execution row: one per test case and (optional) session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionKey {
    pub test_case_id: Uuid,
    pub session_id: Option<Uuid>,
}

impl ExecutionKey {
    pub fn new(test_case_id: Uuid, session_id: Option<Uuid>) -> Self {
        Self {
            test_case_id,
            session_id,
        }
    }

    /// Key for an execution outside of any run session.
    pub fn unscoped(test_case_id: Uuid) -> Self {
        Self::new(test_case_id, None)
    }
}

impl std::fmt::Display for ExecutionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.session_id {
            Some(session_id) => write!(f, "{}@{}", self.test_case_id, session_id),
            None => write!(f, "{}", self.test_case_id),
        }
    }
}

/// A step that failed, with the operator's explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FailedStep {
    pub step_number: i32,
    pub failure_reason: String,
}

/// Run state of one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Execution {
    /// Row id, absent until the first write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub test_case_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub status: ExecutionStatus,
    /// Completed step numbers (set semantics, sorted on the wire).
    #[schema(value_type = Vec<i32>)]
    pub completed_steps: BTreeSet<i32>,
    pub failed_steps: Vec<FailedStep>,
    pub notes: String,
    pub failure_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_by: Option<String>,
    /// Optimistic concurrency counter; 0 means never persisted.
    pub version: i32,
}

impl Execution {
    /// The reading of a test case with no persisted execution.
    pub fn not_run(key: ExecutionKey) -> Self {
        Self {
            id: None,
            test_case_id: key.test_case_id,
            session_id: key.session_id,
            status: ExecutionStatus::NotRun,
            completed_steps: BTreeSet::new(),
            failed_steps: Vec::new(),
            notes: String::new(),
            failure_reason: String::new(),
            started_at: None,
            completed_at: None,
            duration_minutes: None,
            test_environment: None,
            browser: None,
            os_version: None,
            executed_by: None,
            version: 0,
        }
    }

    pub fn key(&self) -> ExecutionKey {
        ExecutionKey::new(self.test_case_id, self.session_id)
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Cleared run state that keeps the row identity (id, version).
    pub fn cleared(&self) -> Self {
        Self {
            id: self.id,
            version: self.version,
            ..Self::not_run(self.key())
        }
    }
}

/// Partial update of an execution.
///
/// `None` leaves a field untouched. For clearable fields, `Some(None)` clears.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionPatch {
    pub status: Option<ExecutionStatus>,
    pub completed_steps: Option<BTreeSet<i32>>,
    pub failed_steps: Option<Vec<FailedStep>>,
    pub notes: Option<String>,
    pub failure_reason: Option<String>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub duration_minutes: Option<Option<i32>>,
    pub test_environment: Option<Option<String>>,
    pub browser: Option<Option<String>>,
    pub os_version: Option<Option<String>>,
}

impl ExecutionPatch {
    /// Merge this patch onto `base`, returning the merged record.
    pub fn apply(self, base: &Execution) -> Execution {
        // Destructured exhaustively so every field is merged.
        let ExecutionPatch {
            status,
            completed_steps,
            failed_steps,
            notes,
            failure_reason,
            started_at,
            completed_at,
            duration_minutes,
            test_environment,
            browser,
            os_version,
        } = self;

        let mut merged = base.clone();
        if let Some(status) = status {
            merged.status = status;
        }
        if let Some(completed_steps) = completed_steps {
            merged.completed_steps = completed_steps;
        }
        if let Some(failed_steps) = failed_steps {
            merged.failed_steps = failed_steps;
        }
        if let Some(notes) = notes {
            merged.notes = notes;
        }
        if let Some(failure_reason) = failure_reason {
            merged.failure_reason = failure_reason;
        }
        if let Some(started_at) = started_at {
            merged.started_at = started_at;
        }
        if let Some(completed_at) = completed_at {
            merged.completed_at = completed_at;
        }
        if let Some(duration_minutes) = duration_minutes {
            merged.duration_minutes = duration_minutes;
        }
        if let Some(test_environment) = test_environment {
            merged.test_environment = test_environment;
        }
        if let Some(browser) = browser {
            merged.browser = browser;
        }
        if let Some(os_version) = os_version {
            merged.os_version = os_version;
        }
        merged
    }
}

/// Context collected before saving a non-passed verdict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExecutionDetails {
    #[serde(default)]
    pub test_environment: Option<String>,
    #[serde(default)]
    pub browser: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl ExecutionDetails {
    /// Patch fields carried by these details; absent values are left untouched.
    pub fn into_patch(self) -> ExecutionPatch {
        ExecutionPatch {
            notes: self.notes,
            failure_reason: self.failure_reason,
            test_environment: self.test_environment.map(Some),
            browser: self.browser.map(Some),
            os_version: self.os_version.map(Some),
            ..ExecutionPatch::default()
        }
    }
}

/// Session scope shared by execution routes.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ExecutionScopeQuery {
    /// Run session; omitted for the unscoped execution.
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

/// Query for the table view badges.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ListExecutionsQuery {
    /// Comma separated test case ids.
    pub test_case_ids: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

impl ListExecutionsQuery {
    pub fn parse_ids(&self) -> Result<Vec<Uuid>, uuid::Error> {
        self.test_case_ids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Uuid::parse_str)
            .collect()
    }
}

/// Executions for a set of test cases.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecutionListResponse {
    pub executions: Vec<Execution>,
}

/// Request to record a final verdict.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MarkResultRequest {
    /// Verdict to record.
    #[serde(default)]
    pub status: Option<Verdict>,
    /// Keyboard shortcut (P/F/B/S) as an alternative to `status`.
    #[serde(default)]
    pub shortcut: Option<String>,
    /// Collected details; required for anything but `passed`.
    #[serde(default)]
    pub details: Option<ExecutionDetails>,
}

impl MarkResultRequest {
    /// Resolve the requested verdict from `status` or `shortcut`.
    pub fn verdict(&self) -> Option<Verdict> {
        if let Some(status) = self.status {
            return Some(status);
        }
        let shortcut = self.shortcut.as_deref()?.trim();
        let mut chars = shortcut.chars();
        match (chars.next(), chars.next()) {
            (Some(key), None) => Verdict::from_shortcut(key),
            _ => None,
        }
    }
}

/// Result of a mark request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MarkResultResponse {
    /// The verdict was persisted.
    Saved { execution: Execution },
    /// Nothing persisted; resubmit with `details`.
    DetailsRequired { status: Verdict },
}

/// Request to fail a single step.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FailStepRequest {
    pub reason: String,
}

/// Request to save notes and environment while a run is in progress.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateProgressRequest {
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub test_environment: Option<String>,
    #[serde(default)]
    pub browser: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
}

impl From<UpdateProgressRequest> for ExecutionPatch {
    fn from(req: UpdateProgressRequest) -> Self {
        ExecutionDetails {
            test_environment: req.test_environment,
            browser: req.browser,
            os_version: req.os_version,
            notes: req.notes,
            failure_reason: req.failure_reason,
        }
        .into_patch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_db_strings() {
        for status in [
            ExecutionStatus::NotRun,
            ExecutionStatus::InProgress,
            ExecutionStatus::Passed,
            ExecutionStatus::Failed,
            ExecutionStatus::Blocked,
            ExecutionStatus::Skipped,
        ] {
            assert_eq!(ExecutionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ExecutionStatus::parse("done"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!ExecutionStatus::NotRun.is_terminal());
        assert!(!ExecutionStatus::InProgress.is_terminal());
        assert!(ExecutionStatus::Blocked.is_terminal());
        assert_eq!(ExecutionStatus::Skipped.verdict(), Some(Verdict::Skipped));
    }

    #[test]
    fn test_shortcuts() {
        assert_eq!(Verdict::from_shortcut('p'), Some(Verdict::Passed));
        assert_eq!(Verdict::from_shortcut('P'), Some(Verdict::Passed));
        assert_eq!(Verdict::from_shortcut('f'), Some(Verdict::Failed));
        assert_eq!(Verdict::from_shortcut('B'), Some(Verdict::Blocked));
        assert_eq!(Verdict::from_shortcut('s'), Some(Verdict::Skipped));
        assert_eq!(Verdict::from_shortcut('x'), None);
    }

    #[test]
    fn test_mark_request_prefers_status_over_shortcut() {
        let req = MarkResultRequest {
            status: Some(Verdict::Blocked),
            shortcut: Some("p".to_string()),
            details: None,
        };
        assert_eq!(req.verdict(), Some(Verdict::Blocked));

        let req = MarkResultRequest {
            status: None,
            shortcut: Some(" F ".to_string()),
            details: None,
        };
        assert_eq!(req.verdict(), Some(Verdict::Failed));

        let req = MarkResultRequest {
            status: None,
            shortcut: Some("pf".to_string()),
            details: None,
        };
        assert_eq!(req.verdict(), None);
    }

    #[test]
    fn test_patch_leaves_untouched_fields() {
        let key = ExecutionKey::unscoped(Uuid::new_v4());
        let mut base = Execution::not_run(key);
        base.notes = "keep".to_string();
        base.browser = Some("firefox".to_string());

        let merged = ExecutionPatch {
            status: Some(ExecutionStatus::InProgress),
            browser: Some(None),
            ..ExecutionPatch::default()
        }
        .apply(&base);

        assert_eq!(merged.status, ExecutionStatus::InProgress);
        assert_eq!(merged.notes, "keep");
        assert_eq!(merged.browser, None);
    }

    #[test]
    fn test_cleared_keeps_identity() {
        let key = ExecutionKey::new(Uuid::new_v4(), Some(Uuid::new_v4()));
        let mut execution = Execution::not_run(key);
        execution.id = Some(Uuid::new_v4());
        execution.version = 4;
        execution.status = ExecutionStatus::Failed;
        execution.completed_steps.insert(2);

        let cleared = execution.cleared();
        assert_eq!(cleared.id, execution.id);
        assert_eq!(cleared.version, 4);
        assert_eq!(cleared.key(), key);
        assert_eq!(cleared.status, ExecutionStatus::NotRun);
        assert!(cleared.completed_steps.is_empty());
    }

    #[test]
    fn test_list_query_parses_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let query = ListExecutionsQuery {
            test_case_ids: format!("{}, {},", a, b),
            session_id: None,
        };
        assert_eq!(query.parse_ids().unwrap(), vec![a, b]);

        let bad = ListExecutionsQuery {
            test_case_ids: "nope".to_string(),
            session_id: None,
        };
        assert!(bad.parse_ids().is_err());
    }

    #[test]
    fn test_mark_response_is_tagged() {
        let json = serde_json::to_value(MarkResultResponse::DetailsRequired {
            status: Verdict::Failed,
        })
        .unwrap();
        assert_eq!(json["outcome"], "details_required");
        assert_eq!(json["status"], "failed");
    }
}
