//! HTTP handler tests driving the router with `tower::ServiceExt::oneshot`.

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use installd::platform::Platform;
use installd::server::{AppState, router};
use serde_json::{Value, json};
use tower::ServiceExt;

use super::helpers::{FakeSpawner, Harness, LIST, USER, harness, linux_apps, wait_terminal};

fn app(h: &Harness, token: Option<&str>) -> Router {
    router(AppState::new(h.manager.clone(), token.map(str::to_string)))
}

fn post(uri: &str, user: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user).header("x-device-id", "laptop");
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::empty()).expect("request")
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.expect("response");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

fn install_uri() -> String {
    format!("/api/lists/{LIST}/install")
}

#[tokio::test]
/// What: Health reports ok with version and platform without identity headers.
async fn http_health_reports_platform() {
    let h = harness(Platform::Linux, linux_apps(1), FakeSpawner::new(true));
    let (status, body) = send(&app(&h, None), get("/api/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["platform"], "linux");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
/// What: A valid install request is accepted and its status can be polled.
///
/// Inputs:
/// - Two Linux apps and a correct password.
///
/// Output:
/// - `202` with id, app count and status URL; status later `completed` at 100.
async fn http_install_then_poll_status() {
    let h = harness(Platform::Linux, linux_apps(2), FakeSpawner::new(true));
    let app = app(&h, None);
    let (status, body) = send(
        &app,
        post(&install_uri(), Some(USER), &json!({ "sudoPassword": "hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["success"], true);
    assert_eq!(body["totalApps"], 2);
    let id = body["installationId"].as_u64().expect("id");
    assert_eq!(body["statusUrl"], format!("/api/installations/{id}/status"));

    wait_terminal(&h.store, id).await;
    let (status, body) = send(&app, get(&format!("/api/installations/{id}/status"), Some(USER))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "status": "completed", "progress": 100, "total": 2, "error": null })
    );
}

#[tokio::test]
/// What: Admission failures map to status codes and symbolic error codes.
///
/// Inputs:
/// - Missing body, empty password, multi-line password, unknown list, wrong password.
///
/// Output:
/// - `400 MISSING_PASSWORD` (twice), `400 VALIDATION_ERROR`, `404 LIST_NOT_FOUND`,
///   `403 INVALID_PASSWORD`.
async fn http_install_error_codes() {
    let h = harness(Platform::Linux, linux_apps(1), FakeSpawner::new(false));
    let app = app(&h, None);
    let uri = install_uri();

    let cases = [
        (post(&uri, Some(USER), &json!({})), StatusCode::BAD_REQUEST, "MISSING_PASSWORD"),
        (
            post(&uri, Some(USER), &json!({ "sudoPassword": "" })),
            StatusCode::BAD_REQUEST,
            "MISSING_PASSWORD",
        ),
        (
            post(&uri, Some(USER), &json!({ "sudoPassword": "a\nb" })),
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
        ),
        (
            post("/api/lists/other/install", Some(USER), &json!({ "sudoPassword": "x" })),
            StatusCode::NOT_FOUND,
            "LIST_NOT_FOUND",
        ),
        (
            post(&uri, Some(USER), &json!({ "sudoPassword": "wrong" })),
            StatusCode::FORBIDDEN,
            "INVALID_PASSWORD",
        ),
    ];
    for (req, want_status, want_code) in cases {
        let (status, body) = send(&app, req).await;
        assert_eq!(status, want_status, "{body}");
        assert_eq!(body["errorCode"], want_code);
        assert!(body["error"].is_string());
    }
    assert!(h.spawner.commands().is_empty());
}

#[tokio::test]
/// What: Lists without usable commands are rejected before the password probe.
async fn http_install_rejects_lists_without_commands() {
    let h = harness(
        Platform::Linux,
        super::helpers::apps(&[r#"{"windows": "winget install x"}"#]),
        FakeSpawner::new(true),
    );
    let (status, body) = send(
        &app(&h, None),
        post(&install_uri(), Some(USER), &json!({ "sudoPassword": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "INVALID_COMMANDS");
    assert_eq!(h.spawner.probes(), 0);
}

#[tokio::test]
/// What: Identity and token checks guard every installation route.
///
/// Output:
/// - Missing `X-User-Id` or a wrong bearer token yields `401 UNAUTHORIZED`;
///   a matching token is accepted.
async fn http_requires_identity_and_token() {
    let h = harness(Platform::Linux, linux_apps(1), FakeSpawner::new(true));
    let open = app(&h, None);
    let (status, body) = send(&open, get("/api/installations/1/status", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["errorCode"], "UNAUTHORIZED");

    let guarded = app(&h, Some("t0ken"));
    let (status, _) = send(&guarded, get("/api/installations/1/status", Some(USER))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .method("POST")
        .uri(install_uri())
        .header("x-user-id", USER)
        .header("authorization", "Bearer t0ken")
        .body(Body::from(json!({ "sudoPassword": "pw" }).to_string()))
        .expect("request");
    let (status, _) = send(&guarded, req).await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
/// What: Status and cancel return 404 for foreign, unknown and malformed ids.
async fn http_status_and_cancel_hide_foreign_records() {
    let h = harness(Platform::Linux, linux_apps(1), FakeSpawner::new(true));
    let app = app(&h, None);
    let (_, body) = send(
        &app,
        post(&install_uri(), Some(USER), &json!({ "sudoPassword": "pw" })),
    )
    .await;
    let id = body["installationId"].as_u64().expect("id");
    wait_terminal(&h.store, id).await;

    let status_uri = format!("/api/installations/{id}/status");
    let cancel_uri = format!("/api/installations/{id}/cancel");
    assert_eq!(send(&app, get(&status_uri, Some("intruder"))).await.0, StatusCode::NOT_FOUND);
    assert_eq!(
        send(&app, post(&cancel_uri, Some("intruder"), &json!({}))).await.0,
        StatusCode::NOT_FOUND
    );
    let (status, body) = send(&app, get("/api/installations/abc/status", Some(USER))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Installation not found");
    assert_eq!(
        send(&app, get("/api/installations/999/status", Some(USER))).await.0,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
/// What: Cancelling over HTTP stops the batch at the next app boundary.
///
/// Inputs:
/// - Three apps; app 1 blocks until the cancel request has been answered.
///
/// Output:
/// - Cancel answers `{success: true}`; status becomes `failed` with the
///   cancellation message and only app 1 ran.
async fn http_cancel_stops_batch() {
    let h = harness(
        Platform::Linux,
        linux_apps(3),
        FakeSpawner::new(true).gated("install 1"),
    );
    let app = app(&h, None);
    let (_, body) = send(
        &app,
        post(&install_uri(), Some(USER), &json!({ "sudoPassword": "pw" })),
    )
    .await;
    let id = body["installationId"].as_u64().expect("id");
    tokio::time::timeout(Duration::from_secs(5), h.spawner.gate().entered.notified())
        .await
        .expect("app 1 started");

    let (status, body) = send(
        &app,
        post(&format!("/api/installations/{id}/cancel"), Some(USER), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
    h.spawner.gate().release.notify_one();

    wait_terminal(&h.store, id).await;
    let (_, body) = send(&app, get(&format!("/api/installations/{id}/status"), Some(USER))).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error"], "Installation cancelled by user");
    assert_eq!(h.spawner.commands(), vec!["install 1"]);
}
