//! Verdicts, details collection, locking and reset.

use actix_web::test;
use serde_json::json;
use uuid::Uuid;

use super::test_helpers::*;

#[actix_rt::test]
async fn test_passed_saves_immediately() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;
    let id = ctx.test_case(2).await;
    toggle(&app, id, 1).await;

    let (status, body) = mark(&app, id, json!({"status": "passed"})).await;

    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["outcome"], "saved");
    assert_eq!(body["execution"]["status"], "passed");
    assert!(body["execution"]["completed_at"].is_string());
    assert_eq!(body["execution"]["duration_minutes"], 0);
}

#[actix_rt::test]
async fn test_failed_shortcut_asks_for_details_first() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;
    let id = ctx.test_case(2).await;

    let (status, body) = mark(&app, id, json!({"shortcut": "F"})).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body, json!({"outcome": "details_required", "status": "failed"}));
    assert_eq!(ctx.store.write_calls(), 0);

    let (status, body) = mark(
        &app,
        id,
        json!({
            "shortcut": "f",
            "details": {
                "failure_reason": "Upload hangs at 99%",
                "browser": "chrome",
                "os_version": "macOS 15"
            }
        }),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["outcome"], "saved");
    assert_eq!(body["execution"]["status"], "failed");
    assert_eq!(body["execution"]["failure_reason"], "Upload hangs at 99%");
    assert_eq!(body["execution"]["os_version"], "macOS 15");
}

#[actix_rt::test]
async fn test_blocked_with_details_leaves_completed_at_unset() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;
    let id = ctx.test_case(2).await;

    let (status, body) = mark(
        &app,
        id,
        json!({"status": "blocked", "details": {"notes": "env down"}}),
    )
    .await;

    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["execution"]["status"], "blocked");
    assert_eq!(body["execution"]["notes"], "env down");
    assert!(body["execution"].get("completed_at").is_none());
}

#[actix_rt::test]
async fn test_missing_or_unknown_verdict() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;
    let id = ctx.test_case(2).await;

    let (status, _) = mark(&app, id, json!({})).await;
    assert_eq!(status, 400);

    let (status, _) = mark(&app, id, json!({"shortcut": "x"})).await;
    assert_eq!(status, 400);
}

#[actix_rt::test]
async fn test_locked_result_until_reset() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;
    let id = ctx.test_case(2).await;
    mark(&app, id, json!({"status": "passed"})).await;

    let (status, body) = mark(
        &app,
        id,
        json!({"status": "failed", "details": {"failure_reason": "changed my mind"}}),
    )
    .await;
    assert_eq!(status, 409, "{}", body);
    assert_eq!(body["error"], "INVALID_TRANSITION");

    let (status, body) = toggle(&app, id, 1).await;
    assert_eq!(status, 409, "{}", body);

    let (status, body) = send(
        &app,
        test::TestRequest::post().uri(&execution_uri(id, "/reset", None)),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["status"], "not_run");
    assert_eq!(body["completed_steps"], json!([]));
    assert_eq!(body["notes"], "");
    assert_eq!(body["failure_reason"], "");

    let (status, body) = mark(&app, id, json!({"shortcut": "s"})).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["outcome"], "details_required");
}

#[actix_rt::test]
async fn test_verdict_for_unknown_test_case_is_not_found() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;

    let (status, body) = mark(&app, Uuid::now_v7(), json!({"status": "passed"})).await;
    assert_eq!(status, 404, "{}", body);
    assert_eq!(body["error"], "NOT_FOUND");
    assert_eq!(ctx.store.write_calls(), 0);
}
