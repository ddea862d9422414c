//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::config::OPERATOR_HEADER;
use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "QA Tracker Server",
        version = "0.1.0",
        description = "Manual test cases, run sessions and step-by-step execution tracking"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Health endpoints
        api::health::health,
        api::health::ready,
        api::health::info,
        // Test case endpoints
        api::test_cases::create_test_case,
        api::test_cases::bulk_create_test_cases,
        api::test_cases::list_test_cases,
        api::test_cases::get_test_case,
        api::test_cases::update_test_case,
        api::test_cases::archive_test_case,
        // Session endpoints
        api::sessions::create_session,
        api::sessions::list_sessions,
        api::sessions::get_session,
        api::sessions::update_session_status,
        // Execution endpoints
        api::executions::list_executions,
        api::executions::get_execution,
        api::executions::toggle_step,
        api::executions::fail_step,
        api::executions::mark_result,
        api::executions::update_progress,
        api::executions::reset_execution,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            models::Pagination,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            api::health::ServerInfoResponse,
            // Test cases
            models::Priority,
            models::TestCaseStatus,
            models::TestStep,
            models::TestCase,
            models::CreateTestCaseRequest,
            models::BulkCreateTestCasesRequest,
            models::BulkCreateResponse,
            models::UpdateTestCaseRequest,
            models::TestCaseListResponse,
            // Sessions
            models::SessionStatus,
            models::TestSession,
            models::CreateSessionRequest,
            models::UpdateSessionStatusRequest,
            models::SessionListResponse,
            // Executions
            models::ExecutionStatus,
            models::Verdict,
            models::FailedStep,
            models::Execution,
            models::ExecutionDetails,
            models::ExecutionListResponse,
            models::MarkResultRequest,
            models::MarkResultResponse,
            models::FailStepRequest,
            models::UpdateProgressRequest,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Test Cases", description = "Test case definitions"),
        (name = "Sessions", description = "Run sessions grouping executions"),
        (name = "Executions", description = "Step progress, verdicts and resets")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Add the operator header security scheme.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "operator",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new(OPERATOR_HEADER),
                    ),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_execution_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/api/v1/executions"));
        assert!(paths.contains_key("/api/v1/test-cases/{test_case_id}/execution/result"));
        assert!(paths.contains_key("/api/v1/sessions/{session_id}/status"));
    }
}
