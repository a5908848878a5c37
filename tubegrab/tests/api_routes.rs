//! HTTP surface tests against the router, no socket involved.

mod common;

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{Harness, Plan, wait_for_batch, wait_for_job};
use tubegrab::api::{ApiServer, ApiServerConfig, AppState};
use tubegrab::domain::Quality;

fn router(h: &Harness) -> Router {
    let state = AppState::new()
        .with_job_manager(h.manager.clone())
        .with_default_quality(Quality::Kbps192)
        .with_versions(Some("2025.01.15".into()), None);
    ApiServer::with_state(ApiServerConfig::default(), state).build_router()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, headers, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn json_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn submit_poll_and_download_single_job() {
    let h = Harness::new();
    h.engine.plan("https://youtu.be/abc", Plan::Succeed("Rock & Roll: Live"));
    let app = router(&h);

    let (status, _, body) = send(
        &app,
        post_json("/api/jobs", json!({"locator": "https://youtu.be/abc", "quality": "320"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let submitted = json_body(&body);
    let job_id = submitted["job_id"].as_str().unwrap().to_string();
    assert_eq!(submitted["quality"], 320);

    wait_for_job(&h.manager, &job_id).await;

    let (status, _, body) = send(&app, get(&format!("/api/jobs/{job_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let job = json_body(&body);
    assert_eq!(job["status"], "done");
    assert_eq!(job["title"], "Rock & Roll: Live");
    assert!(job["error"].is_null());
    assert!(job.get("artifact_path").is_none());

    let (status, headers, body) = send(&app, get(&format!("/api/jobs/{job_id}/file"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "audio/mpeg");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(
        disposition.contains("filename=\"Rock & Roll Live.mp3\""),
        "{disposition}"
    );
    assert_eq!(body, b"audio");
}

#[tokio::test]
async fn unsupported_quality_is_coerced_to_default() {
    let h = Harness::new();
    let app = router(&h);

    for quality in [json!(999), json!("loud"), Value::Null] {
        let (status, _, body) = send(
            &app,
            post_json("/api/jobs", json!({"locator": "x", "quality": quality})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json_body(&body)["quality"], 192);
    }

    let (_, _, body) = send(&app, post_json("/api/jobs", json!({"locator": "x"}))).await;
    assert_eq!(json_body(&body)["quality"], 192);
}

#[tokio::test]
async fn validation_and_not_found_errors() {
    let h = Harness::new();
    let app = router(&h);

    let (status, _, body) = send(&app, post_json("/api/jobs", json!({"locator": "  "}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(&body)["code"], "VALIDATION_ERROR");

    let (status, _, body) = send(&app, post_json("/api/batches", json!({"locators": []}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(&body)["code"], "VALIDATION_ERROR");

    let (status, _, _) = send(
        &app,
        post_json("/api/batches", json!({"locators": ["ok", ""]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _, body) = send(&app, get("/api/jobs/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["code"], "NOT_FOUND");

    let (status, _, _) = send(&app, get("/api/batches/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(h.manager.job_count(), 0);
}

#[tokio::test]
async fn file_before_done_is_not_ready() {
    let h = Harness::new();
    h.engine.set_delay(Duration::from_millis(300));
    let app = router(&h);

    let (_, _, body) = send(&app, post_json("/api/jobs", json!({"locator": "slow"}))).await;
    let job_id = json_body(&body)["job_id"].as_str().unwrap().to_string();

    let (status, _, body) = send(&app, get(&format!("/api/jobs/{job_id}/file"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json_body(&body)["code"], "NOT_READY");
}

#[tokio::test]
async fn batch_submit_poll_and_archive() {
    let h = Harness::new();
    h.engine.plan("b", Plan::FailAll);
    let app = router(&h);

    let (status, _, body) = send(
        &app,
        post_json("/api/batches", json!({"locators": ["a", "b", "c"], "quality": 128})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let submitted = json_body(&body);
    let batch_id = submitted["batch_id"].as_str().unwrap().to_string();
    assert_eq!(submitted["total"], 3);
    assert_eq!(submitted["members"].as_array().unwrap().len(), 3);
    assert_eq!(submitted["members"][0]["status"], "queued");

    wait_for_batch(&h.manager, &batch_id).await;

    let (status, _, body) = send(&app, get(&format!("/api/batches/{batch_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let batch = json_body(&body);
    assert_eq!(batch["status"], "done");
    assert_eq!(batch["completed_count"], 2);
    assert_eq!(batch["failed_count"], 1);
    assert_eq!(batch["members"][1]["status"], "error");

    let (status, headers, body) = send(&app, get(&format!("/api/batches/{batch_id}/archive"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/zip");
    let archive = zip::ZipArchive::new(std::io::Cursor::new(body)).unwrap();
    assert_eq!(archive.len(), 2);
}

#[tokio::test]
async fn archive_of_failed_batch_is_nothing_to_package() {
    let h = Harness::new();
    h.engine.plan("x", Plan::FailAll);
    let app = router(&h);

    let (_, _, body) = send(&app, post_json("/api/batches", json!({"locators": ["x"]}))).await;
    let batch_id = json_body(&body)["batch_id"].as_str().unwrap().to_string();
    wait_for_batch(&h.manager, &batch_id).await;

    let (status, _, body) = send(&app, get(&format!("/api/batches/{batch_id}/archive"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["code"], "NOTHING_TO_PACKAGE");
}

#[tokio::test]
async fn tracks_submission_reports_unresolved_members() {
    let h = Harness::new();
    h.search.hit("Hit Song Band", "https://youtu.be/hit");
    let app = router(&h);

    let (status, _, body) = send(
        &app,
        post_json(
            "/api/tracks",
            json!({"descriptors": [
                {"title": "Hit Song", "artist": "Band"},
                {"title": "Obscure"}
            ]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let batch_id = json_body(&body)["batch_id"].as_str().unwrap().to_string();

    wait_for_batch(&h.manager, &batch_id).await;
    let (_, _, body) = send(&app, get(&format!("/api/batches/{batch_id}"))).await;
    let batch = json_body(&body);
    assert_eq!(batch["kind"], "descriptors");
    assert_eq!(batch["members"][0]["status"], "done");
    assert_eq!(batch["members"][1]["status"], "error");
    assert_eq!(batch["members"][1]["error"], "no match found");
}

#[tokio::test]
async fn tracks_submission_requires_descriptors() {
    let h = Harness::new();
    let app = router(&h);
    let (status, _, _) = send(&app, post_json("/api/tracks", json!({"descriptors": []}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _, _) = send(
        &app,
        post_json("/api/tracks", json!({"descriptors": [{"title": " "}]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn health_reports_versions_and_counts() {
    let h = Harness::new();
    let app = router(&h);
    h.manager.submit_job("x", Quality::Kbps192).unwrap();

    let (status, _, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    let health = json_body(&body);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["extractor_version"], "2025.01.15");
    assert!(health["transcoder_version"].is_null());
    assert_eq!(health["jobs"], 1);
}

#[tokio::test]
async fn logging_filter_without_subscriber_is_unavailable() {
    let h = Harness::new();
    let app = router(&h);
    let (status, _, body) = send(&app, get("/api/logging/filter")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(&body)["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let h = Harness::new();
    let app = router(&h);
    let huge = "x".repeat(2 * 1024 * 1024);
    let (status, _, _) = send(&app, post_json("/api/jobs", json!({"locator": huge}))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(h.manager.job_count(), 0);
}
