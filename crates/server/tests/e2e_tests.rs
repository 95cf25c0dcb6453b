//! End-to-end API tests with mocked external dependencies.
//!
//! These tests run the full router in-process with a mock feed source,
//! mock object store and mock LLM.

mod common;

use axum::http::StatusCode;
use feedline_core::feed::FetchError;
use serde_json::json;

use common::{fixtures, TestFixture, CONTAINER};

// =============================================================================
// Basic API Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_hides_llm_key() {
    let fixture = TestFixture::with_llm("plain");
    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["storage"]["container"], CONTAINER);
    assert_eq!(response.body["llm"]["api_key_configured"], true);
    assert!(!response.body.to_string().contains("test-secret"));
}

#[tokio::test]
async fn test_orchestrator_status() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/orchestrator/status").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["live_jobs"], 0);
}

// =============================================================================
// Job API Tests
// =============================================================================

#[tokio::test]
async fn test_start_job_returns_management_uris() {
    let fixture = TestFixture::new();
    fixture.feed.set_feed("cs", fixtures::sample_feed(3, 0)).await;

    let response = fixture
        .post(
            "/api/v1/jobs",
            json!({"category": "cs", "ProcessDate": "2024-01-01"}),
        )
        .await;

    assert_status!(response, StatusCode::ACCEPTED);
    let id = response.body["id"].as_str().unwrap().to_string();
    let status_uri = format!("http://localhost/api/v1/jobs/{}", id);
    assert_eq!(response.body["statusQueryGetUri"], status_uri);
    assert_eq!(response.body["purgeHistoryDeleteUri"], status_uri);
    assert_eq!(
        response.body["sendEventPostUri"],
        format!("{}/events/{{eventName}}", status_uri)
    );
    assert_eq!(
        response.body["terminatePostUri"],
        format!("{}/terminate?reason={{text}}", status_uri)
    );

    fixture.wait_for_job(&id).await;

    let status = fixture.get(&format!("/api/v1/jobs/{}", id)).await;
    assert_status!(status, StatusCode::OK);
    assert_eq!(status.body["runtimeStatus"], "Completed");
    assert_eq!(status.body["state"], "Completed");
    assert_eq!(status.body["input"]["category"], "cs");
    assert_eq!(status.body["input"]["ProcessDate"], "2024-01-01");
    assert_eq!(status.body["output"]["successful_writes"], 3);
    assert_eq!(status.body["output"]["failed_writes"], 0);
    assert!(status.body["createdAt"].is_string());
    assert!(status.body["lastUpdatedAt"].is_string());
    assert!(status.body.get("error").is_none());
}

#[tokio::test]
async fn test_start_job_defaults_category() {
    let fixture = TestFixture::new();
    fixture.feed.set_feed("cs", fixtures::sample_feed(1, 0)).await;

    let response = fixture
        .post("/api/v1/jobs", json!({"ProcessDate": "2024-01-01"}))
        .await;
    assert_status!(response, StatusCode::ACCEPTED);

    let id = response.body["id"].as_str().unwrap();
    let job = fixture.wait_for_job(id).await;
    assert_eq!(job.input.category, "cs");
}

#[tokio::test]
async fn test_start_job_validation() {
    let fixture = TestFixture::new();

    let missing = fixture.post("/api/v1/jobs", json!({"category": "cs"})).await;
    assert_status!(missing, StatusCode::BAD_REQUEST);
    assert!(missing.body["error"].as_str().unwrap().contains("ProcessDate"));

    let bad_date = fixture
        .post("/api/v1/jobs", json!({"ProcessDate": "01/01/2024"}))
        .await;
    assert_status!(bad_date, StatusCode::BAD_REQUEST);

    let bad_category = fixture
        .post(
            "/api/v1/jobs",
            json!({"category": "cs/../../etc", "ProcessDate": "2024-01-01"}),
        )
        .await;
    assert_status!(bad_category, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failed_job_reports_error() {
    let fixture = TestFixture::new();
    fixture.feed.set_failure(FetchError::Timeout(30)).await;

    let response = fixture
        .post("/api/v1/jobs", json!({"ProcessDate": "2024-01-01"}))
        .await;
    let id = response.body["id"].as_str().unwrap().to_string();
    fixture.wait_for_job(&id).await;

    let status = fixture.get(&format!("/api/v1/jobs/{}", id)).await;
    assert_eq!(status.body["runtimeStatus"], "Failed");
    assert!(status.body["error"].as_str().unwrap().contains("after 2 attempts"));
    assert!(status.body.get("output").is_none());
}

#[tokio::test]
async fn test_unknown_job_is_404() {
    let fixture = TestFixture::new();

    assert_status!(fixture.get("/api/v1/jobs/missing").await, StatusCode::NOT_FOUND);
    assert_status!(
        fixture.get("/api/v1/jobs/missing/history").await,
        StatusCode::NOT_FOUND
    );
    assert_status!(
        fixture.post_empty("/api/v1/jobs/missing/terminate").await,
        StatusCode::NOT_FOUND
    );
    assert_status!(
        fixture.delete("/api/v1/jobs/missing").await,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_list_jobs_by_status() {
    let fixture = TestFixture::new();
    fixture.feed.set_feed("cs", fixtures::sample_feed(1, 0)).await;

    let ok = fixture
        .post("/api/v1/jobs", json!({"ProcessDate": "2024-01-01"}))
        .await;
    let failing = fixture
        .post(
            "/api/v1/jobs",
            json!({"category": "math", "ProcessDate": "2024-01-01"}),
        )
        .await;
    fixture.wait_for_job(ok.body["id"].as_str().unwrap()).await;
    fixture.wait_for_job(failing.body["id"].as_str().unwrap()).await;

    let all = fixture.get("/api/v1/jobs").await;
    assert_status!(all, StatusCode::OK);
    assert_eq!(all.body["jobs"].as_array().unwrap().len(), 2);

    let completed = fixture.get("/api/v1/jobs?status=Completed").await;
    let jobs = completed.body["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], ok.body["id"]);

    let either = fixture.get("/api/v1/jobs?status=completed,failed").await;
    assert_eq!(either.body["jobs"].as_array().unwrap().len(), 2);

    let bogus = fixture.get("/api/v1/jobs?status=Sleeping").await;
    assert_status!(bogus, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_endpoint() {
    let fixture = TestFixture::new();
    fixture.feed.set_feed("cs", fixtures::sample_feed(1, 0)).await;

    let response = fixture
        .post("/api/v1/jobs", json!({"ProcessDate": "2024-01-01"}))
        .await;
    let id = response.body["id"].as_str().unwrap().to_string();
    fixture.wait_for_job(&id).await;

    let history = fixture.get(&format!("/api/v1/jobs/{}/history", id)).await;
    assert_status!(history, StatusCode::OK);
    let events = history.body["events"].as_array().unwrap();
    assert_eq!(events.first().unwrap()["event"]["type"], "orchestrator_started");
    assert_eq!(events.last().unwrap()["event"]["type"], "orchestrator_completed");
    // started + 4 x (scheduled, completed) + completed
    assert_eq!(events.len(), 10);
}

#[tokio::test]
async fn test_raise_event() {
    let fixture = TestFixture::new();
    fixture.feed.set_feed("cs", fixtures::sample_feed(1, 0)).await;

    let response = fixture
        .post("/api/v1/jobs", json!({"ProcessDate": "2024-01-01"}))
        .await;
    let id = response.body["id"].as_str().unwrap().to_string();
    fixture.wait_for_job(&id).await;

    let raised = fixture
        .post(
            &format!("/api/v1/jobs/{}/events/approval", id),
            json!({"approved": true}),
        )
        .await;
    assert_status!(raised, StatusCode::ACCEPTED);

    let history = fixture.get(&format!("/api/v1/jobs/{}/history", id)).await;
    let last = history.body["events"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["event"]["type"], "event_raised");
    assert_eq!(last["event"]["name"], "approval");
    assert_eq!(last["event"]["payload"]["approved"], true);
}

#[tokio::test]
async fn test_terminate_and_purge() {
    let fixture = TestFixture::new();
    fixture.feed.set_feed("cs", fixtures::sample_feed(1, 0)).await;
    fixture.feed.set_delay(std::time::Duration::from_millis(300)).await;

    let response = fixture
        .post("/api/v1/jobs", json!({"ProcessDate": "2024-01-01"}))
        .await;
    let id = response.body["id"].as_str().unwrap().to_string();

    // Purge is refused while the job runs
    let early = fixture.delete(&format!("/api/v1/jobs/{}", id)).await;
    assert_status!(early, StatusCode::CONFLICT);

    let terminated = fixture
        .post_empty(&format!("/api/v1/jobs/{}/terminate?reason=no%20longer%20needed", id))
        .await;
    assert_status!(terminated, StatusCode::ACCEPTED);

    let job = fixture.wait_for_job(&id).await;
    assert_eq!(job.error.as_deref(), Some("no longer needed"));

    let status = fixture.get(&format!("/api/v1/jobs/{}", id)).await;
    assert_eq!(status.body["runtimeStatus"], "Terminated");

    let again = fixture
        .post_empty(&format!("/api/v1/jobs/{}/terminate", id))
        .await;
    assert_status!(again, StatusCode::CONFLICT);

    let purged = fixture.delete(&format!("/api/v1/jobs/{}", id)).await;
    assert_status!(purged, StatusCode::OK);
    assert_status!(
        fixture.get(&format!("/api/v1/jobs/{}", id)).await,
        StatusCode::NOT_FOUND
    );
}

// =============================================================================
// Storage API Tests
// =============================================================================

#[tokio::test]
async fn test_list_and_read_objects() {
    let fixture = TestFixture::new();
    fixture.feed.set_feed("cs", fixtures::sample_feed(2, 0)).await;

    let response = fixture
        .post("/api/v1/jobs", json!({"ProcessDate": "2024-01-01"}))
        .await;
    fixture.wait_for_job(response.body["id"].as_str().unwrap()).await;

    let listing = fixture
        .get("/api/v1/storage/objects?prefix=cs%2FProcessDate%3D2024-01-01%2F")
        .await;
    assert_status!(listing, StatusCode::OK);
    assert_eq!(listing.body["container"], CONTAINER);
    assert_eq!(listing.body["count"], 4);

    let other = fixture.get("/api/v1/storage/objects?prefix=math%2F").await;
    assert_eq!(other.body["count"], 0);

    let (status, bytes) = fixture
        .get_bytes("/api/v1/storage/objects/cs/ProcessDate=2024-01-01/raw.xml")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, fixtures::sample_feed(2, 0).into_bytes());

    let (missing, _) = fixture
        .get_bytes("/api/v1/storage/objects/cs/ProcessDate=2024-01-01/nope.json")
        .await;
    assert_eq!(missing, StatusCode::NOT_FOUND);
}

// =============================================================================
// Simplification API Tests
// =============================================================================

#[tokio::test]
async fn test_simplify_article() {
    let fixture = TestFixture::with_llm("A short, friendly summary.");
    fixture.feed.set_feed("cs", fixtures::sample_feed(1, 0)).await;

    let response = fixture
        .post("/api/v1/jobs", json!({"ProcessDate": "2024-01-01"}))
        .await;
    fixture.wait_for_job(response.body["id"].as_str().unwrap()).await;

    let key = format!("cs/ProcessDate=2024-01-01/{}.json", fixtures::identifier(1));
    let simplified = fixture
        .post("/api/v1/articles/simplify", json!({"key": key}))
        .await;

    assert_status!(simplified, StatusCode::OK);
    assert_eq!(simplified.body["simplified"], "A short, friendly summary.");
    assert_eq!(simplified.body["article"]["identifier"], fixtures::identifier(1));
    assert!(simplified.body["original"]
        .as_str()
        .unwrap()
        .contains("We study problem 1"));

    let llm = fixture.llm.as_ref().unwrap();
    assert_eq!(llm.requests().await.len(), 1);
}

#[tokio::test]
async fn test_simplify_errors() {
    let fixture = TestFixture::with_llm("unused");

    let missing = fixture
        .post(
            "/api/v1/articles/simplify",
            json!({"key": "cs/ProcessDate=2024-01-01/0000.00000v1.json"}),
        )
        .await;
    assert_status!(missing, StatusCode::NOT_FOUND);

    let blank = fixture
        .post("/api/v1/articles/simplify", json!({"key": "  "}))
        .await;
    assert_status!(blank, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_simplify_not_configured() {
    let fixture = TestFixture::new();
    let response = fixture
        .post("/api/v1/articles/simplify", json!({"key": "cs/x.json"}))
        .await;
    assert_status!(response, StatusCode::SERVICE_UNAVAILABLE);
}
