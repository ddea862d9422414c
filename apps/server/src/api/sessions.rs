//! Run session API handlers.

use actix_web::{HttpResponse, web};
use tracing::info;
use uuid::Uuid;

use crate::auth::OperatorAuth;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateSessionRequest, QuerySessionsParams, SessionListResponse, UpdateSessionStatusRequest,
    WsEvent,
};
use crate::services::EventBroadcaster;

/// Open a run session.
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "Sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session opened", body = crate::models::TestSession),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing operator", body = crate::error::ErrorResponse),
    ),
    security(("operator" = []))
)]
pub async fn create_session(
    auth: OperatorAuth,
    pool: web::Data<DbPool>,
    broadcaster: web::Data<EventBroadcaster>,
    body: web::Json<CreateSessionRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    if req.name.trim().is_empty() {
        return Err(AppError::InvalidInput("Session name must not be empty".to_string()));
    }

    let session = pool.insert_session(req, &auth.operator.id).await?;

    info!(session_id = %session.id, operator = %auth.operator, "Session opened");
    broadcaster.publish(WsEvent::session_changed(session.id, session.status.as_str()));

    Ok(HttpResponse::Created().json(session))
}

/// List sessions, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/sessions",
    tag = "Sessions",
    params(
        ("status" = Option<String>, Query, description = "active, completed or aborted"),
        ("limit" = Option<u64>, Query, description = "Max sessions (default: 50, max: 200)"),
    ),
    responses(
        (status = 200, description = "Sessions", body = SessionListResponse),
    )
)]
pub async fn list_sessions(
    pool: web::Data<DbPool>,
    query: web::Query<QuerySessionsParams>,
) -> AppResult<HttpResponse> {
    let sessions = pool.list_sessions(&query).await?;
    Ok(HttpResponse::Ok().json(SessionListResponse { sessions }))
}

/// Get a session by id.
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{session_id}",
    tag = "Sessions",
    params(("session_id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session", body = crate::models::TestSession),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_session(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let session = pool
        .get_session(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {}", id)))?;

    Ok(HttpResponse::Ok().json(session))
}

/// Change a session's status; closing it stamps `completed_at`.
#[utoipa::path(
    put,
    path = "/api/v1/sessions/{session_id}/status",
    tag = "Sessions",
    params(("session_id" = Uuid, Path, description = "Session id")),
    request_body = UpdateSessionStatusRequest,
    responses(
        (status = 200, description = "Updated session", body = crate::models::TestSession),
        (status = 401, description = "Missing operator", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
    ),
    security(("operator" = []))
)]
pub async fn update_session_status(
    auth: OperatorAuth,
    pool: web::Data<DbPool>,
    broadcaster: web::Data<EventBroadcaster>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateSessionStatusRequest>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let session = pool.update_session_status(id, body.status).await?;

    info!(
        session_id = %id,
        status = %session.status,
        operator = %auth.operator,
        "Session status changed"
    );
    broadcaster.publish(WsEvent::session_changed(id, session.status.as_str()));

    Ok(HttpResponse::Ok().json(session))
}

/// Configure session routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/sessions")
            .route(web::get().to(list_sessions))
            .route(web::post().to(create_session)),
    )
    .service(web::resource("/sessions/{session_id}").route(web::get().to(get_session)))
    .service(
        web::resource("/sessions/{session_id}/status").route(web::put().to(update_session_status)),
    );
}
