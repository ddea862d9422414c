//! Shared helpers for execution API tests.

use std::sync::Arc;

use actix_web::{App, dev::ServiceResponse, test, web};
use qa_tracker_lib::config::{OPERATOR_HEADER, TrackerSettings};
use qa_tracker_lib::middleware::RequestLogger;
use qa_tracker_lib::services::EventBroadcaster;
use qa_tracker_lib::tracker::{ExecutionTracker, InMemoryExecutionStore};
use serde_json::Value;
use uuid::Uuid;

pub const TEST_OPERATOR: &str = "qa-runner";

/// Everything a test needs to drive and inspect the app.
pub struct TestContext {
    pub store: Arc<InMemoryExecutionStore>,
    pub broadcaster: EventBroadcaster,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryExecutionStore::new()),
            broadcaster: EventBroadcaster::new(),
        }
    }

    /// Register a test case with `steps` steps.
    pub async fn test_case(&self, steps: i32) -> Uuid {
        let id = Uuid::now_v7();
        self.store.add_test_case(id, steps).await;
        id
    }
}

/// Create a test app serving the execution routes.
pub async fn create_test_app(
    ctx: &TestContext,
) -> impl actix_web::dev::Service<
    actix_http::Request,
    Response = ServiceResponse,
    Error = actix_web::Error,
> {
    let tracker = ExecutionTracker::new(ctx.store.clone(), TrackerSettings::default());

    test::init_service(
        App::new()
            .wrap(RequestLogger)
            .app_data(web::Data::new(tracker))
            .app_data(web::Data::new(ctx.broadcaster.clone()))
            .service(
                web::scope("/api/v1")
                    .configure(qa_tracker_lib::api::configure_execution_routes),
            ),
    )
    .await
}

/// Execution route for a test case, optionally scoped to a session.
pub fn execution_uri(test_case_id: Uuid, suffix: &str, session_id: Option<Uuid>) -> String {
    let mut uri = format!("/api/v1/test-cases/{}/execution{}", test_case_id, suffix);
    if let Some(session_id) = session_id {
        uri.push_str(&format!("?session_id={}", session_id));
    }
    uri
}

/// Send a request as the test operator and return status and JSON body.
pub async fn send<S>(app: &S, req: test::TestRequest) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = req.insert_header((OPERATOR_HEADER, TEST_OPERATOR)).to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status().as_u16();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

/// Toggle a step as the test operator.
pub async fn toggle<S>(app: &S, test_case_id: Uuid, step: i32) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    send(
        app,
        test::TestRequest::post().uri(&execution_uri(
            test_case_id,
            &format!("/steps/{}/toggle", step),
            None,
        )),
    )
    .await
}

/// Post a verdict request body as the test operator.
pub async fn mark<S>(app: &S, test_case_id: Uuid, body: Value) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    send(
        app,
        test::TestRequest::post()
            .uri(&execution_uri(test_case_id, "/result", None))
            .set_json(body),
    )
    .await
}
