#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use powerbench_core::measurement::ToolConfig;
use powerbench_store::{JobStore, MemoryJobStore};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use powerbench_api::config::ServerConfig;
use powerbench_api::engine::ExecutionQueue;
use powerbench_api::router::build_app_router;
use powerbench_api::state::AppState;

/// A running application wired the same way `main.rs` wires it.
///
/// Dropping the harness stops the execution queue.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    cancel: CancellationToken,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> Response<Body> {
        get(self.router.clone(), uri).await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        post_json(self.router.clone(), uri, body).await
    }

    /// Submit a URL and return the accepted response body.
    pub async fn submit(&self, url: &str) -> serde_json::Value {
        let response = self
            .post_json("/measure", serde_json::json!({ "url": url }))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }

    /// Poll `/status/{id}` until the job reaches a terminal state.
    pub async fn wait_for_terminal(&self, job_id: &str) -> serde_json::Value {
        let uri = format!("/status/{job_id}");
        tokio::time::timeout(Duration::from_secs(20), async {
            loop {
                let response = self.get(&uri).await;
                assert_eq!(response.status(), StatusCode::OK);
                let json = body_json(response).await;
                if json["status"] == "complete" || json["status"] == "failed" {
                    return json;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("job did not reach a terminal state")
    }
}

/// Build a test `ServerConfig` whose measurement tool is `sh -c <script>`.
///
/// The script receives the regular tool arguments as `$1..`, so the target
/// URL is `$5`.
pub fn test_config(results_root: &Path, script: &str, tool_timeout: Duration) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        allowed_domains: Vec::new(),
        request_timeout_secs: 30,
        tool: ToolConfig {
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                script.to_string(),
                "measure".to_string(),
            ],
            config_path: results_root.join("power.json"),
            results_root: results_root.to_path_buf(),
            timeout: tool_timeout,
        },
        job_retention_secs: 5 * 60 * 60,
        janitor_interval_secs: 600,
    }
}

/// Build the full application with all middleware layers.
pub fn build_test_app(config: ServerConfig) -> TestApp {
    let cancel = CancellationToken::new();
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let (queue, _dispatcher) = ExecutionQueue::start(cancel.clone());
    let state = AppState::new(config.clone(), store, queue);
    let router = build_app_router(state.clone(), &config);
    TestApp {
        router,
        state,
        cancel,
    }
}

/// A tool script that writes `document` as the result for `target` (the
/// result directory name derived from the URL) after `delay_secs`.
pub fn writing_tool(results_root: &Path, target: &str, document: &str, delay_secs: f32) -> String {
    let dir = results_root.join(target);
    format!(
        "sleep {delay_secs}; mkdir -p '{dir}/run-'$$ && printf '%s' '{document}' > '{dir}/run-'$$/browsertime.json",
        dir = dir.display(),
    )
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_raw(app: Router, uri: &str, content_type: &str, body: &str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", content_type)
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
