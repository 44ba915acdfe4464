//! Shared test helpers for HTTP tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode, header};
use tempfile::TempDir;
use tower::ServiceExt;

use docforge_api::{AppState, build_router};
use docforge_converter::test_support::{FakeConverter, FakeTools, scratch_entries};
use docforge_converter::{ConversionExecutor, ConversionMetrics, JobOrchestrator};
use docforge_core::config::AppConfig;

const BOUNDARY: &str = "docforge-test-boundary";

/// Test application context.
pub struct TestApp {
    /// The Axum router for making test requests.
    pub router: Router,
    /// Scratch directory the app writes into.
    pub scratch: TempDir,
    /// Stand-in converter.
    pub tools: FakeTools,
}

/// Captured response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Body parsed as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("json body")
    }

    /// A header as a string.
    pub fn header(&self, name: header::HeaderName) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

impl TestApp {
    /// Create an app whose converters are all `fake`.
    pub fn new(fake: FakeConverter) -> Self {
        Self::with_config(fake, |_| {})
    }

    /// Like [`TestApp::new`], with `configure` applied to the defaults.
    pub fn with_config(fake: FakeConverter, configure: impl FnOnce(&mut AppConfig)) -> Self {
        let scratch = tempfile::tempdir().expect("scratch dir");
        let tools = FakeTools::new(fake).expect("fake tools");

        let mut config = AppConfig::default();
        configure(&mut config);
        config.conversion.scratch_dir = Some(scratch.path().to_path_buf());

        let orchestrator = JobOrchestrator::new(
            Arc::new(tools.registry(&config.conversion)),
            ConversionExecutor::new(&config.conversion),
            scratch.path(),
            Arc::new(ConversionMetrics::new()),
        );
        let state = AppState::new(Arc::new(config), Arc::new(orchestrator));

        Self {
            router: build_router(state),
            scratch,
            tools,
        }
    }

    /// Send a request and read the whole body.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body")
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// GET a path.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(
            Request::builder()
                .uri(path)
                .body(Body::empty())
                .expect("request"),
        )
        .await
    }

    /// POST a multipart form with an optional file and optional level.
    pub async fn upload(
        &self,
        path: &str,
        file: Option<(&str, &[u8])>,
        level: Option<&str>,
    ) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(file, level)))
            .expect("request");
        self.send(request).await
    }

    /// Entries left in the scratch directory.
    pub fn scratch_entries(&self) -> Vec<String> {
        scratch_entries(self.scratch.path())
    }
}

fn multipart_body(file: Option<(&str, &[u8])>, level: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();

    if let Some(level) = level {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"level\"\r\n\r\n{level}\r\n"
            )
            .as_bytes(),
        );
    }

    if let Some((name, contents)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(contents);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
