//! Step toggling, failing, reading and operator checks.

use actix_web::test;
use qa_tracker_lib::middleware::REQUEST_ID_HEADER;
use qa_tracker_lib::models::{ExecutionKey, ExecutionStatus, WsEvent};
use serde_json::json;
use uuid::Uuid;

use super::test_helpers::*;

#[actix_rt::test]
async fn test_read_untouched_execution() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;
    let id = ctx.test_case(3).await;

    let (status, body) = send(&app, test::TestRequest::get().uri(&execution_uri(id, "", None))).await;

    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["status"], "not_run");
    assert_eq!(body["completed_steps"], json!([]));
    assert_eq!(body["failed_steps"], json!([]));
    assert_eq!(body["version"], 0);
}

#[actix_rt::test]
async fn test_toggle_requires_operator() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;
    let id = ctx.test_case(3).await;

    let req = test::TestRequest::post()
        .uri(&execution_uri(id, "/steps/1/toggle", None))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 401);
    assert!(resp.headers().contains_key(REQUEST_ID_HEADER));
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "UNAUTHORIZED");
    assert_eq!(ctx.store.write_calls(), 0);
}

#[actix_rt::test]
async fn test_toggle_starts_run_and_broadcasts() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;
    let id = ctx.test_case(3).await;
    let mut events = ctx.broadcaster.subscribe();

    let (status, body) = toggle(&app, id, 1).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["status"], "in_progress");
    assert_eq!(body["completed_steps"], json!([1]));
    assert_eq!(body["executed_by"], TEST_OPERATOR);
    assert!(body["started_at"].is_string());

    let message = events.recv().await.unwrap();
    match message.event {
        WsEvent::ExecutionUpdated(payload) => {
            assert_eq!(payload.test_case_id, id);
            assert_eq!(payload.status, ExecutionStatus::InProgress);
            assert_eq!(payload.completed_steps, 1);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    let (_, body) = toggle(&app, id, 1).await;
    assert_eq!(body["completed_steps"], json!([]));
    assert_eq!(body["status"], "in_progress");
}

#[actix_rt::test]
async fn test_unknown_step_and_test_case() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;
    let id = ctx.test_case(2).await;

    let (status, body) = toggle(&app, id, 3).await;
    assert_eq!(status, 400, "{}", body);
    assert_eq!(body["error"], "INVALID_INPUT");

    let (status, body) = toggle(&app, Uuid::now_v7(), 1).await;
    assert_eq!(status, 404, "{}", body);
}

#[actix_rt::test]
async fn test_fail_step_then_toggle() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;
    let id = ctx.test_case(3).await;

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri(&execution_uri(id, "/steps/2/fail", None))
            .set_json(json!({"reason": "Dialog never closes"})),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(
        body["failed_steps"],
        json!([{"step_number": 2, "failure_reason": "Dialog never closes"}])
    );

    let (_, body) = toggle(&app, id, 2).await;
    assert_eq!(body["failed_steps"], json!([]));
    assert_eq!(body["completed_steps"], json!([2]));

    let (status, _) = send(
        &app,
        test::TestRequest::post()
            .uri(&execution_uri(id, "/steps/1/fail", None))
            .set_json(json!({"reason": ""})),
    )
    .await;
    assert_eq!(status, 400);
}

#[actix_rt::test]
async fn test_session_scope_is_separate() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;
    let id = ctx.test_case(2).await;
    let session_id = Uuid::now_v7();

    let (status, body) = send(
        &app,
        test::TestRequest::post().uri(&execution_uri(id, "/steps/1/toggle", Some(session_id))),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["session_id"], session_id.to_string());

    let (_, unscoped) =
        send(&app, test::TestRequest::get().uri(&execution_uri(id, "", None))).await;
    assert_eq!(unscoped["status"], "not_run");

    assert!(
        ctx.store
            .stored(&ExecutionKey::new(id, Some(session_id)))
            .await
            .is_some()
    );
}

#[actix_rt::test]
async fn test_list_executions_in_request_order() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;
    let a = ctx.test_case(2).await;
    let b = ctx.test_case(2).await;
    toggle(&app, b, 2).await;

    let (status, body) = send(
        &app,
        test::TestRequest::get().uri(&format!("/api/v1/executions?test_case_ids={},{}", a, b)),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    let executions = body["executions"].as_array().unwrap();
    assert_eq!(executions.len(), 2);
    assert_eq!(executions[0]["test_case_id"], a.to_string());
    assert_eq!(executions[0]["status"], "not_run");
    assert_eq!(executions[1]["status"], "in_progress");

    let (status, body) = send(
        &app,
        test::TestRequest::get().uri("/api/v1/executions?test_case_ids=not-a-uuid"),
    )
    .await;
    assert_eq!(status, 400, "{}", body);
}

#[actix_rt::test]
async fn test_progress_patch_saves_notes() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;
    let id = ctx.test_case(2).await;
    toggle(&app, id, 1).await;

    let (status, body) = send(
        &app,
        test::TestRequest::patch()
            .uri(&execution_uri(id, "", None))
            .set_json(json!({"notes": "Staging is slow", "browser": "safari"})),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["notes"], "Staging is slow");
    assert_eq!(body["browser"], "safari");
    assert_eq!(body["status"], "in_progress");
    assert_eq!(body["version"], 2);
}

#[actix_rt::test]
async fn test_stale_version_returns_conflict() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;
    let id = ctx.test_case(3).await;
    toggle(&app, id, 1).await;

    let key = ExecutionKey::unscoped(id);
    let theirs = ctx.store.stored(&key).await.unwrap();
    ctx.store.overwrite(theirs).await;

    let (status, body) = toggle(&app, id, 2).await;
    assert_eq!(status, 409, "{}", body);
    assert_eq!(body["error"], "CONFLICT");

    let (status, body) = toggle(&app, id, 2).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["completed_steps"], json!([1, 2]));
}
