//! Common test utilities for API testing with mocks.
//!
//! Builds the real router over an in-memory job store, a mock feed source,
//! a mock object store and (optionally) a mock LLM client, so requests can
//! be driven with `tower::ServiceExt::oneshot` without binding a port.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use feedline_core::{
    testing::{MockFeedSource, MockLlmClient, MockObjectStore},
    Activities, Config, JobOrchestrator, JobRecord, LlmConfig, PipelineConfig, RetryConfig,
    Simplifier, SqliteJobStore, StoreGateway,
};
use feedline_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use feedline_core::testing::fixtures;

pub const CONTAINER: &str = "arxiv-data";

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_start_job() {
///     let fixture = TestFixture::new();
///     fixture.feed.set_feed("cs", fixtures::sample_feed(3, 0)).await;
///
///     let response = fixture.post("/api/v1/jobs", json!({"ProcessDate": "2024-01-01"})).await;
///     assert_eq!(response.status, 202);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub orchestrator: Arc<JobOrchestrator>,
    /// Mock feed source - configure feeds and failures
    pub feed: Arc<MockFeedSource>,
    /// Mock object store - inspect written objects
    pub store: Arc<MockObjectStore>,
    /// Mock LLM, present when simplification is enabled
    pub llm: Option<Arc<MockLlmClient>>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Fixture without text simplification.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Fixture whose LLM answers every request with `reply`.
    pub fn with_llm(reply: &str) -> Self {
        Self::build(Some(Arc::new(MockLlmClient::new(reply))))
    }

    fn build(llm: Option<Arc<MockLlmClient>>) -> Self {
        let feed = Arc::new(MockFeedSource::new());
        let store = Arc::new(MockObjectStore::new());
        let gateway = StoreGateway::new(store.clone(), CONTAINER);

        let job_store =
            Arc::new(SqliteJobStore::in_memory().expect("Failed to create job store"));
        let activities = Activities::new(feed.clone(), gateway.clone(), PipelineConfig::default());
        let orchestrator = Arc::new(JobOrchestrator::new(
            job_store,
            activities,
            RetryConfig::immediate(2),
        ));

        let llm_config = LlmConfig {
            api_base: "http://llm.invalid/v1".to_string(),
            api_key: Some("test-secret".to_string()),
            ..LlmConfig::default()
        };
        let simplifier = llm.as_ref().map(|client| {
            Arc::new(Simplifier::new(
                client.clone(),
                gateway.clone(),
                llm_config.clone(),
            ))
        });

        let config = Config {
            llm: llm.as_ref().map(|_| llm_config),
            ..Config::default()
        };

        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&orchestrator),
            gateway,
            simplifier,
        ));

        Self {
            router: create_router(state),
            orchestrator,
            feed,
            store,
            llm,
        }
    }

    /// Wait for a job to reach a terminal state.
    pub async fn wait_for_job(&self, id: &str) -> JobRecord {
        self.orchestrator
            .wait_for_completion(id, Duration::from_secs(10))
            .await
            .expect("Job did not finish")
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// GET returning the raw body bytes.
    pub async fn get_bytes(&self, path: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, bytes.to_vec())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder()
            .method(method)
            .uri(path)
            .header("Host", "localhost");

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
