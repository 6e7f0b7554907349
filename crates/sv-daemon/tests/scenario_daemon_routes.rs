//! In-process scenario tests for the sv-daemon HTTP endpoints.
//!
//! The router is built over in-memory stores and driven with
//! `tower::ServiceExt::oneshot`; no socket, no network.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use sv_config::secrets::SecretError;
use sv_daemon::{routes, state};
use sv_testkit::Harness;
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_router(h: &Harness) -> axum::Router {
    let controller = h.controller(&[]).expect("harness config");
    routes::build_router(Arc::new(state::AppState::new(controller)))
}

async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, serde_json::Value) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body: bytes::Bytes = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, serde_json::from_slice(&body).expect("body is not valid JSON"))
}

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

fn post_validate(body: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/validate")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let h = Harness::new();
    let (status, json) = call(make_router(&h), get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "sv-daemon");
}

// ---------------------------------------------------------------------------
// POST /v1/validate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clean_run_is_200_and_becomes_latest() {
    let h = Harness::new();
    h.source.put("a.txt", 3, None);
    h.target.put("a.txt", 3, None);
    let router = make_router(&h);

    let (status, json) = call(router.clone(), get("/v1/runs/latest")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "not_found");

    let (status, json) = call(router.clone(), post_validate(r#"{"expected_files":["a.txt"]}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"]["fatal"], false);
    assert_eq!(json["result"]["checked"], 1);
    assert_eq!(json["trigger"], "http");

    let (status, latest) = call(router, get("/v1/runs/latest")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["result"]["run_id"], json["result"]["run_id"]);
}

#[tokio::test]
async fn fatal_run_is_422_with_the_result() {
    let h = Harness::new();
    h.source.put("report_20250101.txt", 500, None);

    let (status, json) = call(
        make_router(&h),
        post_validate(r#"{"mode":"daily","expected_files":["report_20250101.txt"]}"#),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["result"]["fatal"], true);
    assert_eq!(json["result"]["discrepancies"][0]["kind"], "MISSING_IN_TARGET");
}

#[tokio::test]
async fn weekly_run_is_200_even_with_differences() {
    let h = Harness::new();
    h.source.put("only-in-source.zip", 1, Some(sv_testkit::reference_now()));

    let (status, json) = call(make_router(&h), post_validate(r#"{"mode":"weekly"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"]["fatal"], false);
    assert_eq!(json["result"]["inventory"]["source_only"], 1);
}

#[tokio::test]
async fn unsupported_mode_is_400() {
    let h = Harness::new();
    let (status, json) = call(make_router(&h), post_validate(r#"{"mode":"hourly"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "configuration");
    assert_eq!(h.factory.opened(), 0);
}

#[tokio::test]
async fn malformed_body_is_400() {
    let h = Harness::new();
    let (status, json) = call(make_router(&h), post_validate(r#"{"days":"three"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().starts_with("CONFIG_INVALID"));
}

#[tokio::test]
async fn missing_secret_is_503_and_not_recorded() {
    let h = Harness::new();
    h.factory.fail_secret(SecretError::Unavailable("no secret".into()));
    let router = make_router(&h);

    let (status, json) = call(router.clone(), post_validate("{}")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["kind"], "secret_unavailable");

    let (status, _) = call(router, get("/v1/runs/latest")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
