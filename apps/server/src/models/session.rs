//! Test run session models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Status of a run session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
    Aborted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }

    /// Whether the session has ended.
    pub fn is_closed(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named group of executions (one pass over a set of test cases).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TestSession {
    pub id: Uuid,
    pub name: String,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request to open a session.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    pub name: String,
    #[serde(default)]
    pub environment: Option<String>,
}

/// Request to change a session's status.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateSessionStatusRequest {
    pub status: SessionStatus,
}

/// Query parameters for listing sessions.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct QuerySessionsParams {
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub limit: Option<u64>,
}

/// Session list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionListResponse {
    pub sessions: Vec<TestSession>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_status_strings() {
        assert_eq!(SessionStatus::parse("completed"), Some(SessionStatus::Completed));
        assert_eq!(SessionStatus::parse("paused"), None);
        assert!(!SessionStatus::Active.is_closed());
        assert!(SessionStatus::Aborted.is_closed());
    }
}
