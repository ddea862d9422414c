//! Execution API handlers: step progress, verdicts and resets.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use crate::auth::OperatorAuth;
use crate::error::{AppError, AppResult};
use crate::models::{
    ExecutionKey, ExecutionListResponse, ExecutionScopeQuery, FailStepRequest,
    ListExecutionsQuery, MarkResultRequest, MarkResultResponse, UpdateProgressRequest, WsEvent,
};
use crate::services::EventBroadcaster;
use crate::tracker::{ExecutionTracker, MarkOutcome};

/// Most test cases a single badge query may ask for.
const MAX_BATCH_IDS: usize = 500;

fn execution_key(test_case_id: Uuid, scope: &ExecutionScopeQuery) -> ExecutionKey {
    ExecutionKey::new(test_case_id, scope.session_id)
}

/// Executions for a set of test cases (table view badges).
///
/// Test cases without an execution read as `not_run`.
#[utoipa::path(
    get,
    path = "/api/v1/executions",
    tag = "Executions",
    params(
        ("test_case_ids" = String, Query, description = "Comma separated test case ids"),
        ("session_id" = Option<Uuid>, Query, description = "Run session; omit for unscoped executions"),
    ),
    responses(
        (status = 200, description = "Executions in request order", body = ExecutionListResponse),
        (status = 400, description = "Invalid id list", body = crate::error::ErrorResponse),
    )
)]
pub async fn list_executions(
    tracker: web::Data<ExecutionTracker>,
    query: web::Query<ListExecutionsQuery>,
) -> AppResult<HttpResponse> {
    let ids = query.parse_ids()?;
    if ids.len() > MAX_BATCH_IDS {
        return Err(AppError::InvalidInput(format!(
            "At most {} test case ids per request",
            MAX_BATCH_IDS
        )));
    }

    let executions = tracker.executions(&ids, query.session_id).await?;
    Ok(HttpResponse::Ok().json(ExecutionListResponse { executions }))
}

/// Current execution of one test case.
#[utoipa::path(
    get,
    path = "/api/v1/test-cases/{test_case_id}/execution",
    tag = "Executions",
    params(
        ("test_case_id" = Uuid, Path, description = "Test case id"),
        ("session_id" = Option<Uuid>, Query, description = "Run session"),
    ),
    responses(
        (status = 200, description = "Execution (not_run when none recorded)", body = crate::models::Execution),
    )
)]
pub async fn get_execution(
    tracker: web::Data<ExecutionTracker>,
    path: web::Path<Uuid>,
    scope: web::Query<ExecutionScopeQuery>,
) -> AppResult<HttpResponse> {
    let execution = tracker
        .execution(execution_key(path.into_inner(), &scope))
        .await?;
    Ok(HttpResponse::Ok().json(execution))
}

/// Toggle completion of a step.
#[utoipa::path(
    post,
    path = "/api/v1/test-cases/{test_case_id}/execution/steps/{step_number}/toggle",
    tag = "Executions",
    params(
        ("test_case_id" = Uuid, Path, description = "Test case id"),
        ("step_number" = i32, Path, description = "Step number (1-based)"),
        ("session_id" = Option<Uuid>, Query, description = "Run session"),
    ),
    responses(
        (status = 200, description = "Updated execution", body = crate::models::Execution),
        (status = 400, description = "Unknown step", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing operator", body = crate::error::ErrorResponse),
        (status = 404, description = "Test case not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Result locked or concurrent change", body = crate::error::ErrorResponse),
    ),
    security(("operator" = []))
)]
pub async fn toggle_step(
    auth: OperatorAuth,
    tracker: web::Data<ExecutionTracker>,
    broadcaster: web::Data<EventBroadcaster>,
    path: web::Path<(Uuid, i32)>,
    scope: web::Query<ExecutionScopeQuery>,
) -> AppResult<HttpResponse> {
    let (test_case_id, step_number) = path.into_inner();
    let execution = tracker
        .toggle_step(&auth.operator, execution_key(test_case_id, &scope), step_number)
        .await?;

    broadcaster.publish(WsEvent::execution_updated(&execution));
    Ok(HttpResponse::Ok().json(execution))
}

/// Mark a step as failed with a reason.
#[utoipa::path(
    post,
    path = "/api/v1/test-cases/{test_case_id}/execution/steps/{step_number}/fail",
    tag = "Executions",
    params(
        ("test_case_id" = Uuid, Path, description = "Test case id"),
        ("step_number" = i32, Path, description = "Step number (1-based)"),
        ("session_id" = Option<Uuid>, Query, description = "Run session"),
    ),
    request_body = FailStepRequest,
    responses(
        (status = 200, description = "Updated execution", body = crate::models::Execution),
        (status = 400, description = "Unknown step or empty reason", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing operator", body = crate::error::ErrorResponse),
        (status = 404, description = "Test case not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Result locked or concurrent change", body = crate::error::ErrorResponse),
    ),
    security(("operator" = []))
)]
pub async fn fail_step(
    auth: OperatorAuth,
    tracker: web::Data<ExecutionTracker>,
    broadcaster: web::Data<EventBroadcaster>,
    path: web::Path<(Uuid, i32)>,
    scope: web::Query<ExecutionScopeQuery>,
    body: web::Json<FailStepRequest>,
) -> AppResult<HttpResponse> {
    let (test_case_id, step_number) = path.into_inner();
    let execution = tracker
        .fail_step(
            &auth.operator,
            execution_key(test_case_id, &scope),
            step_number,
            &body.reason,
        )
        .await?;

    broadcaster.publish(WsEvent::execution_updated(&execution));
    Ok(HttpResponse::Ok().json(execution))
}

/// Record a verdict.
///
/// `passed` is saved immediately. Other verdicts without `details` return
/// `{"outcome":"details_required"}` and save nothing; resubmit with details.
#[utoipa::path(
    post,
    path = "/api/v1/test-cases/{test_case_id}/execution/result",
    tag = "Executions",
    params(
        ("test_case_id" = Uuid, Path, description = "Test case id"),
        ("session_id" = Option<Uuid>, Query, description = "Run session"),
    ),
    request_body = MarkResultRequest,
    responses(
        (status = 200, description = "Saved, or details required", body = MarkResultResponse),
        (status = 400, description = "No verdict given", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing operator", body = crate::error::ErrorResponse),
        (status = 404, description = "Test case not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Result locked or concurrent change", body = crate::error::ErrorResponse),
    ),
    security(("operator" = []))
)]
pub async fn mark_result(
    auth: OperatorAuth,
    tracker: web::Data<ExecutionTracker>,
    broadcaster: web::Data<EventBroadcaster>,
    path: web::Path<Uuid>,
    scope: web::Query<ExecutionScopeQuery>,
    body: web::Json<MarkResultRequest>,
) -> AppResult<HttpResponse> {
    let key = execution_key(path.into_inner(), &scope);
    let req = body.into_inner();
    let verdict = req.verdict().ok_or_else(|| {
        AppError::InvalidInput(
            "Provide a status (passed/failed/blocked/skipped) or a shortcut (P/F/B/S)".to_string(),
        )
    })?;

    let outcome = match req.details {
        Some(details) => MarkOutcome::Saved(
            tracker
                .save_execution_result(&auth.operator, key, verdict, details)
                .await?,
        ),
        None => tracker.mark_test_result(&auth.operator, key, verdict).await?,
    };

    let response = match outcome {
        MarkOutcome::Saved(execution) => {
            broadcaster.publish(WsEvent::execution_updated(&execution));
            MarkResultResponse::Saved { execution }
        }
        MarkOutcome::DetailsRequired(status) => MarkResultResponse::DetailsRequired { status },
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Save notes and environment fields while a run is in progress.
#[utoipa::path(
    patch,
    path = "/api/v1/test-cases/{test_case_id}/execution",
    tag = "Executions",
    params(
        ("test_case_id" = Uuid, Path, description = "Test case id"),
        ("session_id" = Option<Uuid>, Query, description = "Run session"),
    ),
    request_body = UpdateProgressRequest,
    responses(
        (status = 200, description = "Updated execution", body = crate::models::Execution),
        (status = 401, description = "Missing operator", body = crate::error::ErrorResponse),
        (status = 404, description = "Test case not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Result locked or concurrent change", body = crate::error::ErrorResponse),
    ),
    security(("operator" = []))
)]
pub async fn update_progress(
    auth: OperatorAuth,
    tracker: web::Data<ExecutionTracker>,
    broadcaster: web::Data<EventBroadcaster>,
    path: web::Path<Uuid>,
    scope: web::Query<ExecutionScopeQuery>,
    body: web::Json<UpdateProgressRequest>,
) -> AppResult<HttpResponse> {
    let execution = tracker
        .save_execution_progress(
            &auth.operator,
            execution_key(path.into_inner(), &scope),
            body.into_inner().into(),
        )
        .await?;

    broadcaster.publish(WsEvent::execution_updated(&execution));
    Ok(HttpResponse::Ok().json(execution))
}

/// Clear an execution back to `not_run`.
#[utoipa::path(
    post,
    path = "/api/v1/test-cases/{test_case_id}/execution/reset",
    tag = "Executions",
    params(
        ("test_case_id" = Uuid, Path, description = "Test case id"),
        ("session_id" = Option<Uuid>, Query, description = "Run session"),
    ),
    responses(
        (status = 200, description = "Cleared execution", body = crate::models::Execution),
        (status = 401, description = "Missing operator", body = crate::error::ErrorResponse),
        (status = 409, description = "Concurrent change", body = crate::error::ErrorResponse),
    ),
    security(("operator" = []))
)]
pub async fn reset_execution(
    auth: OperatorAuth,
    tracker: web::Data<ExecutionTracker>,
    broadcaster: web::Data<EventBroadcaster>,
    path: web::Path<Uuid>,
    scope: web::Query<ExecutionScopeQuery>,
) -> AppResult<HttpResponse> {
    let key = execution_key(path.into_inner(), &scope);
    let execution = tracker.reset_test(&auth.operator, key).await?;

    broadcaster.publish(WsEvent::execution_reset(key));
    Ok(HttpResponse::Ok().json(execution))
}

/// Configure execution routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/executions").route(web::get().to(list_executions)))
        .service(
            web::resource("/test-cases/{test_case_id}/execution")
                .route(web::get().to(get_execution))
                .route(web::patch().to(update_progress)),
        )
        .service(
            web::resource("/test-cases/{test_case_id}/execution/steps/{step_number}/toggle")
                .route(web::post().to(toggle_step)),
        )
        .service(
            web::resource("/test-cases/{test_case_id}/execution/steps/{step_number}/fail")
                .route(web::post().to(fail_step)),
        )
        .service(
            web::resource("/test-cases/{test_case_id}/execution/result")
                .route(web::post().to(mark_result)),
        )
        .service(
            web::resource("/test-cases/{test_case_id}/execution/reset")
                .route(web::post().to(reset_execution)),
        );
}
