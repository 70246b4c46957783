//! Integration tests for measurement submission, status polling and expiry.
//!
//! The measurement tool is replaced by small `sh` scripts that either write
//! a result document where the locator expects it or fail in a chosen way.

#![cfg(unix)]

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use chrono::Utc;
use common::{body_json, build_test_app, post_raw, test_config, writing_tool};
use powerbench_api::background::job_retention::purge_expired;
use powerbench_core::job::Job;
use serde_json::json;

const DOCUMENT: &str = r#"{"powerConsumption":[5],"cpu":12,"statistics":{"powerConsumption":{"median":4.5,"mean":4.75}},"googleWebVitals":[{"firstContentfulPaint":812}],"browserScripts":[{"browser":{"userAgent":"test"}}],"info":{"browser":{"name":"chrome"}}}"#;

fn quick_app(dir: &tempfile::TempDir, script: &str) -> common::TestApp {
    build_test_app(test_config(dir.path(), script, Duration::from_secs(10)))
}

async fn assert_invalid(app: &common::TestApp, body: serde_json::Value) {
    let response = app.post_json("/measure", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid or missing URL");
    assert_eq!(json["code"], "INVALID_INPUT");
}

// ---------------------------------------------------------------------------
// Submission validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejects_non_http_scheme() {
    let dir = tempfile::tempdir().unwrap();
    let app = quick_app(&dir, "exit 0");

    assert_invalid(&app, json!({ "url": "ftp://example.com/file" })).await;
    assert_invalid(&app, json!({ "url": "javascript:alert(1)" })).await;
}

#[tokio::test]
async fn rejects_overlong_url() {
    let dir = tempfile::tempdir().unwrap();
    let app = quick_app(&dir, "exit 0");
    let url = format!("https://example.com/{}", "a".repeat(3000));

    assert_invalid(&app, json!({ "url": url })).await;
}

#[tokio::test]
async fn rejects_missing_or_empty_url() {
    let dir = tempfile::tempdir().unwrap();
    let app = quick_app(&dir, "exit 0");

    assert_invalid(&app, json!({})).await;
    assert_invalid(&app, json!({ "url": "" })).await;
    assert_invalid(&app, json!({ "url": "   " })).await;
    assert_invalid(&app, json!({ "url": "not a url" })).await;
}

#[tokio::test]
async fn rejects_malformed_body() {
    let dir = tempfile::tempdir().unwrap();
    let app = quick_app(&dir, "exit 0");

    let response = post_raw(app.router.clone(), "/measure", "application/json", "{not json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid or missing URL");

    let response = post_raw(app.router.clone(), "/measure", "text/plain", "https://example.com").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rejected_submissions_create_no_job() {
    let dir = tempfile::tempdir().unwrap();
    let app = quick_app(&dir, "exit 0");

    assert_invalid(&app, json!({ "url": "ftp://example.com/" })).await;

    assert!(app.state.store.list().await.is_empty());
    assert_eq!(app.state.queue.depth(), 0);
}

#[tokio::test]
async fn allow_list_restricts_hosts() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), "exit 0", Duration::from_secs(10));
    config.allowed_domains = vec!["example.com".to_string()];
    let app = build_test_app(config);

    assert_invalid(&app, json!({ "url": "https://evil.test/" })).await;
    assert_invalid(&app, json!({ "url": "https://notexample.com/" })).await;

    let accepted = app.submit("https://www.example.com/").await;
    assert_eq!(accepted["status"], "queued");
    let accepted = app.submit("https://example.com/").await;
    assert_eq!(accepted["status"], "queued");
}

#[tokio::test]
async fn empty_allow_list_accepts_any_host() {
    let dir = tempfile::tempdir().unwrap();
    let app = quick_app(&dir, "exit 0");

    let accepted = app.submit("http://anything.test/page").await;
    assert_eq!(accepted["status"], "queued");
}

// ---------------------------------------------------------------------------
// Status lookups
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_job_returns_404_with_stable_shape() {
    let dir = tempfile::tempdir().unwrap();
    let app = quick_app(&dir, "exit 0");
    let id = uuid::Uuid::new_v4();

    let response = app.get(&format!("/status/{id}")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Job not found");
    assert_eq!(json["code"], "NOT_FOUND");
    assert!(json["message"].as_str().unwrap().contains(&id.to_string()));
}

#[tokio::test]
async fn malformed_job_id_returns_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = quick_app(&dir, "exit 0");

    let response = app.get("/status/not-a-job-id").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Job not found");
}

// ---------------------------------------------------------------------------
// Job lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_measurement_completes_with_projected_result() {
    let dir = tempfile::tempdir().unwrap();
    let script = writing_tool(dir.path(), "example.com", DOCUMENT, 0.0);
    let app = quick_app(&dir, &script);

    let accepted = app.submit("https://example.com/").await;
    assert_eq!(accepted["position"], 0);
    assert!(accepted["message"].is_string());
    let job_id = accepted["jobId"].as_str().unwrap().to_string();

    let job = app.wait_for_terminal(&job_id).await;

    assert_eq!(job["status"], "complete");
    assert_eq!(job["url"], "https://example.com/");
    assert!(job.get("position").is_none());
    assert!(job.get("error").is_none());
    assert!(job["startedAt"].is_string());
    assert!(job["completedAt"].is_string());

    let result = &job["result"];
    assert_eq!(result["powerConsumption"], 5);
    assert_eq!(result["cpuTime"], "12 ms");
    assert!(result["executionTime"].as_str().unwrap().ends_with(" ms"));
    assert_eq!(result["statistics"]["powerConsumption"]["median"], 4.5);
    assert_eq!(result["statistics"]["powerConsumption"]["mean"], 4.75);
    assert_eq!(result["googleWebVitals"]["firstContentfulPaint"], 812);
    assert_eq!(result["browserScripts"]["browser"]["userAgent"], "test");
    assert_eq!(result["info"]["browser"]["name"], "chrome");
}

#[tokio::test]
async fn tool_exit_failure_marks_job_failed() {
    let dir = tempfile::tempdir().unwrap();
    let app = quick_app(&dir, "echo 'browser crashed' >&2; exit 3");

    let accepted = app.submit("https://example.com/").await;
    let job = app
        .wait_for_terminal(accepted["jobId"].as_str().unwrap())
        .await;

    assert_eq!(job["status"], "failed");
    assert!(job.get("result").is_none());
    let error = &job["error"];
    assert_eq!(error["kind"], "executionFailure");
    assert_eq!(error["timedOut"], false);
    assert_eq!(error["exitCode"], 3);
    assert!(error["details"].as_str().unwrap().contains("browser crashed"));
}

#[tokio::test]
async fn missing_result_artifact_marks_job_failed() {
    let dir = tempfile::tempdir().unwrap();
    let app = quick_app(&dir, "exit 0");

    let accepted = app.submit("https://example.com/docs").await;
    let job = app
        .wait_for_terminal(accepted["jobId"].as_str().unwrap())
        .await;

    assert_eq!(job["status"], "failed");
    let error = &job["error"];
    assert_eq!(error["kind"], "resultNotFound");
    assert!(error["domainDir"]
        .as_str()
        .unwrap()
        .ends_with("example.com-docs"));
    assert!(error["latestFolder"].is_null());
}

#[tokio::test]
async fn unparseable_result_marks_job_failed() {
    let dir = tempfile::tempdir().unwrap();
    let script = writing_tool(dir.path(), "example.com", "{truncated", 0.0);
    let app = quick_app(&dir, &script);

    let accepted = app.submit("https://example.com/").await;
    let job = app
        .wait_for_terminal(accepted["jobId"].as_str().unwrap())
        .await;

    assert_eq!(job["status"], "failed");
    assert_eq!(job["error"]["kind"], "resultNotFound");
    assert!(job["error"]["latestFolder"].is_string());
}

#[tokio::test]
async fn tool_timeout_marks_job_failed() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(test_config(dir.path(), "sleep 30", Duration::from_millis(300)));

    let started = std::time::Instant::now();
    let accepted = app.submit("https://example.com/").await;
    let job = app
        .wait_for_terminal(accepted["jobId"].as_str().unwrap())
        .await;

    assert!(started.elapsed() < Duration::from_secs(15));
    assert_eq!(job["status"], "failed");
    assert_eq!(job["error"]["kind"], "executionFailure");
    assert_eq!(job["error"]["timedOut"], true);
}

// ---------------------------------------------------------------------------
// Queue positions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn positions_count_jobs_ahead_and_are_visible_while_queued() {
    let dir = tempfile::tempdir().unwrap();
    let script = writing_tool(dir.path(), "example.com", DOCUMENT, 1.0);
    let app = quick_app(&dir, &script);

    let first = app.submit("https://example.com/").await;
    let second = app.submit("https://example.com/").await;
    let third = app.submit("https://example.com/").await;

    assert_eq!(first["position"], 0);
    assert_eq!(second["position"], 1);
    assert_eq!(third["position"], 2);

    let response = app
        .get(&format!("/status/{}", third["jobId"].as_str().unwrap()))
        .await;
    let waiting = body_json(response).await;
    assert_eq!(waiting["status"], "queued");
    assert_eq!(waiting["position"], 2);
    assert!(waiting.get("startedAt").is_none());

    let health = body_json(app.get("/health").await).await;
    assert_eq!(health["queueDepth"], 3);

    for accepted in [&first, &second, &third] {
        let job = app
            .wait_for_terminal(accepted["jobId"].as_str().unwrap())
            .await;
        assert_eq!(job["status"], "complete");
    }
}

#[tokio::test]
async fn jobs_run_in_submission_order() {
    let dir = tempfile::tempdir().unwrap();
    let script = writing_tool(dir.path(), "example.com", DOCUMENT, 0.1);
    let app = quick_app(&dir, &script);

    let mut ids = Vec::new();
    for _ in 0..3 {
        let accepted = app.submit("https://example.com/").await;
        ids.push(accepted["jobId"].as_str().unwrap().to_string());
    }

    let mut finished = Vec::new();
    for id in &ids {
        let job = app.wait_for_terminal(id).await;
        finished.push((
            job["startedAt"].as_str().unwrap().to_string(),
            job["completedAt"].as_str().unwrap().to_string(),
        ));
    }

    // Each job starts no earlier than the previous one completed.
    for pair in finished.windows(2) {
        let previous_end = chrono::DateTime::parse_from_rfc3339(&pair[0].1).unwrap();
        let next_start = chrono::DateTime::parse_from_rfc3339(&pair[1].0).unwrap();
        assert!(next_start >= previous_end);
    }
}

// ---------------------------------------------------------------------------
// Expiry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn expired_jobs_report_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = quick_app(&dir, "exit 0");

    let old = Job::new(
        "https://example.com/",
        0,
        Utc::now() - chrono::Duration::hours(6),
    );
    let id = old.id;
    app.state.store.put(old).await;

    let response = app.get(&format!("/status/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "queued");

    let purged = purge_expired(
        app.state.store.as_ref(),
        app.state.config.job_retention(),
        Utc::now(),
    )
    .await;
    assert_eq!(purged, 1);

    let response = app.get(&format!("/status/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
