//! Test case domain models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Pagination;
use crate::error::{AppError, AppResult};

/// Test case priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Lifecycle status of a test case definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TestCaseStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

impl TestCaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for TestCaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One step of a test case (stored as JSONB).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TestStep {
    /// 1-based position; assigned from list order when omitted.
    #[serde(default)]
    pub step_number: i32,
    pub action: String,
    #[serde(default)]
    pub expected: String,
}

/// Normalize and validate a step list.
///
/// Steps without a number are numbered by position. Numbering must then be
/// exactly 1..=n in order and every action must be non-empty.
pub fn normalize_steps(steps: Vec<TestStep>) -> Result<Vec<TestStep>, String> {
    let mut normalized = Vec::with_capacity(steps.len());
    for (index, mut step) in steps.into_iter().enumerate() {
        let position = index as i32 + 1;
        if step.step_number == 0 {
            step.step_number = position;
        }
        if step.step_number != position {
            return Err(format!(
                "Step numbers must be contiguous from 1: expected {}, found {}",
                position, step.step_number
            ));
        }
        if step.action.trim().is_empty() {
            return Err(format!("Step {} has an empty action", position));
        }
        normalized.push(step);
    }
    Ok(normalized)
}

pub fn steps_to_json(steps: &[TestStep]) -> AppResult<JsonValue> {
    serde_json::to_value(steps)
        .map_err(|e| AppError::Database(format!("Failed to encode steps: {}", e)))
}

/// Decode the stored `steps` column; a malformed value is a database error.
pub fn steps_from_json(value: &JsonValue) -> AppResult<Vec<TestStep>> {
    serde_json::from_value(value.clone())
        .map_err(|e| AppError::Database(format!("Corrupt steps: {}", e)))
}

/// Test case definition.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TestCase {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form type (functional, regression, smoke, ...).
    pub test_type: String,
    pub priority: Priority,
    pub steps: Vec<TestStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preconditions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_result: Option<String>,
    pub status: TestCaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_test_type() -> String {
    "functional".to_string()
}

/// Request to create a test case.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateTestCaseRequest {
    #[serde(default)]
    pub project_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_test_type")]
    pub test_type: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub steps: Vec<TestStep>,
    #[serde(default)]
    pub preconditions: Option<String>,
    #[serde(default)]
    pub expected_result: Option<String>,
    #[serde(default)]
    pub status: TestCaseStatus,
}

impl CreateTestCaseRequest {
    /// Validate the request, normalizing its steps in place.
    pub fn validate(&mut self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Title must not be empty".to_string());
        }
        if self.status == TestCaseStatus::Archived {
            return Err("Test cases cannot be created archived".to_string());
        }
        self.steps = normalize_steps(std::mem::take(&mut self.steps))?;
        Ok(())
    }
}

/// Request to create several test cases at once (generated suites).
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BulkCreateTestCasesRequest {
    pub test_cases: Vec<CreateTestCaseRequest>,
}

/// Request to update a test case. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateTestCaseRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub test_type: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub steps: Option<Vec<TestStep>>,
    #[serde(default)]
    pub preconditions: Option<String>,
    #[serde(default)]
    pub expected_result: Option<String>,
    #[serde(default)]
    pub status: Option<TestCaseStatus>,
}

impl UpdateTestCaseRequest {
    pub fn validate(&mut self) -> Result<(), String> {
        if let Some(title) = &self.title
            && title.trim().is_empty()
        {
            return Err("Title must not be empty".to_string());
        }
        if let Some(steps) = self.steps.take() {
            self.steps = Some(normalize_steps(steps)?);
        }
        Ok(())
    }
}

/// Query parameters for listing test cases.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct QueryTestCasesParams {
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<TestCaseStatus>,
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Case-insensitive title search.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Paginated test case list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TestCaseListResponse {
    pub test_cases: Vec<TestCase>,
    pub pagination: Pagination,
}

/// Response after bulk creation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkCreateResponse {
    pub created: Vec<TestCase>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(number: i32, action: &str) -> TestStep {
        TestStep {
            step_number: number,
            action: action.to_string(),
            expected: String::new(),
        }
    }

    #[test]
    fn test_normalize_assigns_missing_numbers() {
        let steps = normalize_steps(vec![step(0, "open"), step(0, "click"), step(3, "check")])
            .unwrap();
        let numbers: Vec<i32> = steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_normalize_rejects_gaps_and_empty_actions() {
        assert!(normalize_steps(vec![step(1, "open"), step(3, "click")]).is_err());
        assert!(normalize_steps(vec![step(1, "  ")]).is_err());
    }

    #[test]
    fn test_create_request_validation() {
        let mut req: CreateTestCaseRequest = serde_json::from_value(serde_json::json!({
            "title": "Login works",
            "steps": [{"action": "open /login"}, {"action": "submit", "expected": "dashboard"}]
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.test_type, "functional");
        assert_eq!(req.priority, Priority::Medium);
        assert_eq!(req.steps[1].step_number, 2);

        req.title = " ".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_corrupt_steps_are_a_database_error() {
        let steps = vec![step(1, "open")];
        let stored = steps_to_json(&steps).unwrap();
        assert_eq!(steps_from_json(&stored).unwrap(), steps);

        let err = steps_from_json(&serde_json::json!({"not": "a list"})).unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }
}
