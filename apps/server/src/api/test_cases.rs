//! Test case API handlers.

use actix_web::{HttpResponse, web};
use tracing::info;
use uuid::Uuid;

use crate::auth::OperatorAuth;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{
    BulkCreateResponse, BulkCreateTestCasesRequest, CreateTestCaseRequest, Pagination,
    PaginationParams, QueryTestCasesParams, TestCaseListResponse, UpdateTestCaseRequest, WsEvent,
};
use crate::services::EventBroadcaster;

/// Most test cases accepted by one bulk request.
const MAX_BULK_TEST_CASES: usize = 200;

/// Create a test case.
#[utoipa::path(
    post,
    path = "/api/v1/test-cases",
    tag = "Test Cases",
    request_body = CreateTestCaseRequest,
    responses(
        (status = 201, description = "Test case created", body = crate::models::TestCase),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing operator", body = crate::error::ErrorResponse),
    ),
    security(("operator" = []))
)]
pub async fn create_test_case(
    auth: OperatorAuth,
    pool: web::Data<DbPool>,
    broadcaster: web::Data<EventBroadcaster>,
    body: web::Json<CreateTestCaseRequest>,
) -> AppResult<HttpResponse> {
    let mut req = body.into_inner();
    req.validate().map_err(AppError::InvalidInput)?;

    let test_case = pool.insert_test_case(req, &auth.operator.id).await?;

    info!(
        test_case_id = %test_case.id,
        steps = test_case.steps.len(),
        operator = %auth.operator,
        "Test case created"
    );
    broadcaster.publish(WsEvent::test_case_changed(test_case.id, test_case.status.as_str()));

    Ok(HttpResponse::Created().json(test_case))
}

/// Create several test cases at once. Nothing is stored if any is invalid.
#[utoipa::path(
    post,
    path = "/api/v1/test-cases/bulk",
    tag = "Test Cases",
    request_body = BulkCreateTestCasesRequest,
    responses(
        (status = 201, description = "Test cases created", body = BulkCreateResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing operator", body = crate::error::ErrorResponse),
    ),
    security(("operator" = []))
)]
pub async fn bulk_create_test_cases(
    auth: OperatorAuth,
    pool: web::Data<DbPool>,
    broadcaster: web::Data<EventBroadcaster>,
    body: web::Json<BulkCreateTestCasesRequest>,
) -> AppResult<HttpResponse> {
    let mut requests = body.into_inner().test_cases;
    if requests.is_empty() || requests.len() > MAX_BULK_TEST_CASES {
        return Err(AppError::InvalidInput(format!(
            "test_cases must contain 1-{} entries",
            MAX_BULK_TEST_CASES
        )));
    }

    for (index, req) in requests.iter_mut().enumerate() {
        req.validate()
            .map_err(|e| AppError::InvalidInput(format!("test_cases[{}]: {}", index, e)))?;
    }

    let created = pool.insert_test_cases(requests, &auth.operator.id).await?;

    info!(
        count = created.len(),
        operator = %auth.operator,
        "Test cases created in bulk"
    );
    for test_case in &created {
        broadcaster.publish(WsEvent::test_case_changed(test_case.id, test_case.status.as_str()));
    }

    Ok(HttpResponse::Created().json(BulkCreateResponse { created }))
}

/// List test cases with filters and pagination.
#[utoipa::path(
    get,
    path = "/api/v1/test-cases",
    tag = "Test Cases",
    params(
        ("project_id" = Option<Uuid>, Query, description = "Filter by project"),
        ("status" = Option<String>, Query, description = "draft, active or archived (archived hidden by default)"),
        ("priority" = Option<String>, Query, description = "low, medium, high or critical"),
        ("search" = Option<String>, Query, description = "Case-insensitive title search"),
        ("page" = Option<u32>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u32>, Query, description = "Items per page (default: 50, max: 100)"),
    ),
    responses(
        (status = 200, description = "Test cases", body = TestCaseListResponse),
    )
)]
pub async fn list_test_cases(
    pool: web::Data<DbPool>,
    query: web::Query<QueryTestCasesParams>,
) -> AppResult<HttpResponse> {
    let (test_cases, total) = pool.query_test_cases(&query).await?;
    let pagination = PaginationParams {
        page: query.page,
        limit: query.limit,
    };

    Ok(HttpResponse::Ok().json(TestCaseListResponse {
        test_cases,
        pagination: Pagination::new(pagination.page(), pagination.clamped_limit(), total),
    }))
}

/// Get a test case by id.
#[utoipa::path(
    get,
    path = "/api/v1/test-cases/{test_case_id}",
    tag = "Test Cases",
    params(("test_case_id" = Uuid, Path, description = "Test case id")),
    responses(
        (status = 200, description = "Test case", body = crate::models::TestCase),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_test_case(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let test_case = pool
        .get_test_case(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Test case {}", id)))?;

    Ok(HttpResponse::Ok().json(test_case))
}

/// Update a test case. Absent fields are left untouched.
#[utoipa::path(
    put,
    path = "/api/v1/test-cases/{test_case_id}",
    tag = "Test Cases",
    params(("test_case_id" = Uuid, Path, description = "Test case id")),
    request_body = UpdateTestCaseRequest,
    responses(
        (status = 200, description = "Updated test case", body = crate::models::TestCase),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing operator", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
    ),
    security(("operator" = []))
)]
pub async fn update_test_case(
    auth: OperatorAuth,
    pool: web::Data<DbPool>,
    broadcaster: web::Data<EventBroadcaster>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateTestCaseRequest>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let mut req = body.into_inner();
    req.validate().map_err(AppError::InvalidInput)?;

    let test_case = pool.update_test_case(id, req).await?;

    info!(test_case_id = %id, operator = %auth.operator, "Test case updated");
    broadcaster.publish(WsEvent::test_case_changed(id, test_case.status.as_str()));

    Ok(HttpResponse::Ok().json(test_case))
}

/// Archive a test case. Executions are kept.
#[utoipa::path(
    delete,
    path = "/api/v1/test-cases/{test_case_id}",
    tag = "Test Cases",
    params(("test_case_id" = Uuid, Path, description = "Test case id")),
    responses(
        (status = 200, description = "Archived test case", body = crate::models::TestCase),
        (status = 401, description = "Missing operator", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
    ),
    security(("operator" = []))
)]
pub async fn archive_test_case(
    auth: OperatorAuth,
    pool: web::Data<DbPool>,
    broadcaster: web::Data<EventBroadcaster>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let test_case = pool.archive_test_case(id).await?;

    info!(test_case_id = %id, operator = %auth.operator, "Test case archived");
    broadcaster.publish(WsEvent::test_case_changed(id, test_case.status.as_str()));

    Ok(HttpResponse::Ok().json(test_case))
}

/// Configure test case routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/test-cases")
            .route(web::get().to(list_test_cases))
            .route(web::post().to(create_test_case)),
    )
    .service(web::resource("/test-cases/bulk").route(web::post().to(bulk_create_test_cases)))
    .service(
        web::resource("/test-cases/{test_case_id}")
            .route(web::get().to(get_test_case))
            .route(web::put().to(update_test_case))
            .route(web::delete().to(archive_test_case)),
    );
}
