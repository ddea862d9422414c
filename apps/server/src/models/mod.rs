//! Domain models for the QA tracker.

use utoipa::ToSchema;

pub mod execution;
pub mod operator;
pub mod session;
pub mod test_case;
pub mod ws_event;

// Re-export commonly used types
pub use execution::{
    Execution, ExecutionDetails, ExecutionKey, ExecutionListResponse, ExecutionPatch,
    ExecutionScopeQuery, ExecutionStatus, FailStepRequest, FailedStep, ListExecutionsQuery,
    MarkResultRequest, MarkResultResponse, UpdateProgressRequest, Verdict,
};
pub use operator::Operator;
pub use session::{
    CreateSessionRequest, QuerySessionsParams, SessionListResponse, SessionStatus, TestSession,
    UpdateSessionStatusRequest,
};
pub use test_case::{
    BulkCreateResponse, BulkCreateTestCasesRequest, CreateTestCaseRequest, Priority,
    QueryTestCasesParams, TestCase, TestCaseListResponse, TestCaseStatus, TestStep,
    UpdateTestCaseRequest,
};
pub use ws_event::{WsEvent, WsEventMessage};

/// Pagination parameters.
#[derive(Debug, Clone, Copy, Default, serde::Deserialize, ToSchema)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    50
}

impl PaginationParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(default_page()).max(1)
    }

    /// Calculate the offset for database queries.
    pub fn offset(&self) -> u32 {
        (self.page() - 1) * self.clamped_limit()
    }

    /// Clamp limit to maximum allowed value.
    pub fn clamped_limit(&self) -> u32 {
        self.limit.unwrap_or(default_limit()).clamp(1, 100)
    }
}

/// Pagination metadata for responses.
#[derive(Debug, Clone, serde::Serialize, ToSchema)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    /// Create pagination metadata.
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            ((total as f64) / (limit as f64)).ceil() as u32
        };

        Pagination {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_math() {
        let params = PaginationParams {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(params.offset(), 20);

        let params = PaginationParams {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(params.offset(), 0);
        assert_eq!(params.clamped_limit(), 100);

        assert_eq!(Pagination::new(1, 10, 25).total_pages, 3);
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
    }
}
