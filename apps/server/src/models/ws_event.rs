//! WebSocket event types for real-time updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Execution, ExecutionKey, ExecutionStatus};

/// WebSocket event sent to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
#[serde(rename_all = "snake_case")]
pub enum WsEvent {
    /// An execution changed (step toggled/failed, verdict saved, progress saved).
    ExecutionUpdated(ExecutionUpdatedPayload),
    /// An execution was reset to not_run.
    ExecutionReset(ExecutionResetPayload),
    /// A test case was created, edited or archived.
    TestCaseChanged(TestCaseChangedPayload),
    /// A session was opened or its status changed.
    SessionChanged(SessionChangedPayload),
}

/// Payload for execution_updated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionUpdatedPayload {
    pub test_case_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub status: ExecutionStatus,
    pub completed_steps: usize,
    pub failed_steps: usize,
    pub version: i32,
}

/// Payload for execution_reset event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResetPayload {
    pub test_case_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

/// Payload for test_case_changed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseChangedPayload {
    pub test_case_id: Uuid,
    pub status: String,
}

/// Payload for session_changed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionChangedPayload {
    pub session_id: Uuid,
    pub status: String,
}

/// Wrapper that includes timestamp with every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsEventMessage {
    #[serde(flatten)]
    pub event: WsEvent,
    pub timestamp: DateTime<Utc>,
}

impl WsEventMessage {
    /// Create a new event message with the current timestamp.
    pub fn new(event: WsEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }
}

impl WsEvent {
    /// Create an execution_updated event from the saved execution.
    pub fn execution_updated(execution: &Execution) -> Self {
        WsEvent::ExecutionUpdated(ExecutionUpdatedPayload {
            test_case_id: execution.test_case_id,
            session_id: execution.session_id,
            status: execution.status,
            completed_steps: execution.completed_steps.len(),
            failed_steps: execution.failed_steps.len(),
            version: execution.version,
        })
    }

    /// Create an execution_reset event.
    pub fn execution_reset(key: ExecutionKey) -> Self {
        WsEvent::ExecutionReset(ExecutionResetPayload {
            test_case_id: key.test_case_id,
            session_id: key.session_id,
        })
    }

    /// Create a test_case_changed event.
    pub fn test_case_changed(test_case_id: Uuid, status: &str) -> Self {
        WsEvent::TestCaseChanged(TestCaseChangedPayload {
            test_case_id,
            status: status.to_string(),
        })
    }

    /// Create a session_changed event.
    pub fn session_changed(session_id: Uuid, status: &str) -> Self {
        WsEvent::SessionChanged(SessionChangedPayload {
            session_id,
            status: status.to_string(),
        })
    }
}
