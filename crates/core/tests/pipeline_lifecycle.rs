//! Pipeline lifecycle integration tests.
//!
//! These tests run whole jobs through the orchestrator with a mock feed
//! source and an instrumented mock object store:
//! - Object layout and metadata counts of a completed job
//! - Skipped entries and per-article write failures
//! - The write concurrency bound
//! - Retry and failure behaviour of fetch and parse errors
//! - Idempotent reruns

use std::sync::Arc;
use std::time::Duration;

use feedline_core::{
    feed::FetchError,
    history::HistoryEvent,
    storage::keys,
    testing::{fixtures, MockFeedSource, MockObjectStore},
    Activities, ActivityOutput, JobInput, JobOrchestrator, JobRecord, OrchestrationState, PipelineConfig,
    PipelineStep, ProcessingMetadata, RetryConfig, RuntimeStatus, SqliteJobStore, StoreGateway,
};

const CONTAINER: &str = "arxiv-data";
const JOB_TIMEOUT: Duration = Duration::from_secs(10);

/// Test helper wiring an orchestrator to mocks.
struct TestHarness {
    orchestrator: JobOrchestrator,
    feed: Arc<MockFeedSource>,
    store: Arc<MockObjectStore>,
}

impl TestHarness {
    fn new() -> Self {
        Self::with(MockObjectStore::new(), PipelineConfig::default())
    }

    fn with(store: MockObjectStore, pipeline: PipelineConfig) -> Self {
        let feed = Arc::new(MockFeedSource::new());
        let store = Arc::new(store);
        let job_store =
            Arc::new(SqliteJobStore::in_memory().expect("Failed to create job store"));

        let activities = Activities::new(
            feed.clone(),
            StoreGateway::new(store.clone(), CONTAINER),
            pipeline,
        );
        let orchestrator = JobOrchestrator::new(job_store, activities, RetryConfig::immediate(3));

        Self {
            orchestrator,
            feed,
            store,
        }
    }

    async fn run(&self, category: &str) -> JobRecord {
        let job = self
            .orchestrator
            .start_job(JobInput::new(category, fixtures::process_date()))
            .await
            .expect("Failed to start job");

        self.orchestrator
            .wait_for_completion(&job.id, JOB_TIMEOUT)
            .await
            .expect("Job did not finish")
    }

    async fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.store.get(CONTAINER, key).await
    }

    async fn metadata(&self, category: &str) -> ProcessingMetadata {
        let key = keys::metadata_key(category, fixtures::process_date());
        let bytes = self.object(&key).await.expect("metadata not written");
        serde_json::from_slice(&bytes).expect("metadata is not valid JSON")
    }

    async fn article_keys(&self, category: &str) -> Vec<String> {
        let raw = keys::raw_key(category, fixtures::process_date());
        let metadata = keys::metadata_key(category, fixtures::process_date());
        self.store
            .keys(CONTAINER)
            .await
            .into_iter()
            .filter(|k| *k != raw && *k != metadata)
            .collect()
    }
}

fn article_key(n: usize) -> String {
    format!(
        "cs/ProcessDate=2024-01-01/{}.json",
        fixtures::identifier(n)
    )
}

// ============================================================================
// Successful runs
// ============================================================================

#[tokio::test]
async fn test_three_entries_complete() {
    let harness = TestHarness::new();
    harness.feed.set_feed("cs", fixtures::sample_feed(3, 0)).await;

    let job = harness.run("cs").await;

    assert_eq!(job.runtime_status, RuntimeStatus::Completed);
    assert_eq!(job.state, OrchestrationState::Completed);
    assert!(job.error.is_none());

    let output = job.output.expect("completed job has output");
    assert_eq!(output.raw_key, "cs/ProcessDate=2024-01-01/raw.xml");
    assert_eq!(output.metadata_key, "cs/ProcessDate=2024-01-01/metadata.json");
    assert_eq!(output.successful_writes, 3);
    assert_eq!(output.failed_writes, 0);

    // 1 raw + 3 articles + 1 metadata
    assert_eq!(harness.store.object_count(CONTAINER).await, 5);
    for n in 1..=3 {
        assert!(harness.store.contains(CONTAINER, &article_key(n)).await);
    }

    let metadata = harness.metadata("cs").await;
    assert_eq!(metadata.total_entries, 3);
    assert_eq!(metadata.parsed_articles, 3);
    assert_eq!(metadata.successful_writes, 3);
    assert_eq!(metadata.failed_writes, 0);
    assert_eq!(metadata.raw_key, output.raw_key);
    assert_eq!(metadata.source_url, "mock://feeds/cs");
}

#[tokio::test]
async fn test_article_object_content() {
    let harness = TestHarness::new();
    harness.feed.set_feed("cs", fixtures::sample_feed(1, 0)).await;

    harness.run("cs").await;

    let bytes = harness.object(&article_key(1)).await.unwrap();
    let article: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(article["identifier"], fixtures::identifier(1));
    assert_eq!(article["title"], "Paper 1");
    assert_eq!(
        article["link"],
        format!("https://arxiv.org/abs/{}", fixtures::identifier(1))
    );
}

#[tokio::test]
async fn test_entries_without_identifier_are_skipped() {
    let harness = TestHarness::new();
    harness.feed.set_feed("cs", fixtures::sample_feed(10, 3)).await;

    let job = harness.run("cs").await;
    assert_eq!(job.runtime_status, RuntimeStatus::Completed);

    let output = job.output.unwrap();
    assert_eq!(output.total_entries, 10);
    assert_eq!(output.parsed_articles, 7);
    assert_eq!(output.skipped_entries, 3);

    let metadata = harness.metadata("cs").await;
    assert_eq!(metadata.total_entries, 10);
    assert_eq!(metadata.parsed_articles, 7);
    assert_eq!(
        metadata.successful_writes + metadata.failed_writes,
        metadata.parsed_articles
    );
    assert_eq!(harness.article_keys("cs").await.len(), 7);
}

#[tokio::test]
async fn test_empty_feed_completes() {
    let harness = TestHarness::new();
    harness.feed.set_feed("cs", fixtures::sample_feed(0, 0)).await;

    let job = harness.run("cs").await;
    assert_eq!(job.runtime_status, RuntimeStatus::Completed);
    assert_eq!(job.output.unwrap().parsed_articles, 0);
    // raw + metadata only
    assert_eq!(harness.store.object_count(CONTAINER).await, 2);
}

#[tokio::test]
async fn test_write_concurrency_is_bounded() {
    let store = MockObjectStore::new().with_write_delay(Duration::from_millis(10));
    let harness = TestHarness::with(
        store,
        PipelineConfig {
            max_concurrent_writes: 4,
        },
    );
    harness.feed.set_feed("cs", fixtures::sample_feed(30, 0)).await;

    let job = harness.run("cs").await;

    assert_eq!(job.runtime_status, RuntimeStatus::Completed);
    assert_eq!(job.output.unwrap().successful_writes, 30);
    assert!(
        harness.store.max_in_flight() <= 4,
        "saw {} writes in flight",
        harness.store.max_in_flight()
    );
    assert!(harness.store.max_in_flight() >= 2);
}

#[tokio::test]
async fn test_single_write_failure_still_completes() {
    let harness = TestHarness::new();
    harness.feed.set_feed("cs", fixtures::sample_feed(5, 0)).await;
    harness.store.fail_key(&article_key(2)).await;

    let job = harness.run("cs").await;

    assert_eq!(job.runtime_status, RuntimeStatus::Completed);
    let output = job.output.unwrap();
    assert_eq!(output.successful_writes, 4);
    assert_eq!(output.failed_writes, 1);
    assert_eq!(output.failed_identifiers, vec![fixtures::identifier(2)]);

    let metadata = harness.metadata("cs").await;
    assert_eq!(metadata.failed_writes, 1);
    assert_eq!(harness.article_keys("cs").await.len(), 4);
    assert!(!harness.store.contains(CONTAINER, &article_key(2)).await);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let harness = TestHarness::new();
    harness.feed.set_feed("cs", fixtures::sample_feed(4, 1)).await;

    let first = harness.run("cs").await;
    assert_eq!(first.runtime_status, RuntimeStatus::Completed);

    let raw_key = keys::raw_key("cs", fixtures::process_date());
    let raw_before = harness.object(&raw_key).await.unwrap();
    let article_before = harness.object(&article_key(1)).await.unwrap();
    let metadata_before = harness.metadata("cs").await;
    let keys_before = harness.store.keys(CONTAINER).await;

    let second = harness.run("cs").await;
    assert_eq!(second.runtime_status, RuntimeStatus::Completed);
    assert_ne!(first.id, second.id);

    assert_eq!(harness.store.keys(CONTAINER).await, keys_before);
    assert_eq!(harness.object(&raw_key).await.unwrap(), raw_before);
    assert_eq!(harness.object(&article_key(1)).await.unwrap(), article_before);

    let metadata_after = harness.metadata("cs").await;
    assert_eq!(
        ProcessingMetadata {
            processed_at: metadata_before.processed_at,
            ..metadata_after
        },
        metadata_before
    );
}

#[tokio::test]
async fn test_missing_container_is_created() {
    let harness = TestHarness::with(MockObjectStore::new().without_container(), PipelineConfig::default());
    harness.feed.set_feed("cs", fixtures::sample_feed(2, 0)).await;

    let job = harness.run("cs").await;

    assert_eq!(job.runtime_status, RuntimeStatus::Completed);
    assert!(harness.store.ensure_container_calls() >= 1);
    assert_eq!(harness.store.object_count(CONTAINER).await, 4);
}

// ============================================================================
// Failures and retries
// ============================================================================

#[tokio::test]
async fn test_transient_fetch_failure_is_retried() {
    let harness = TestHarness::new();
    harness.feed.set_feed("cs", fixtures::sample_feed(2, 0)).await;
    harness
        .feed
        .fail_next(
            2,
            FetchError::Status {
                status: 503,
                url: "mock://feeds/cs".to_string(),
            },
        )
        .await;

    let job = harness.run("cs").await;

    assert_eq!(job.runtime_status, RuntimeStatus::Completed);
    assert_eq!(harness.feed.fetch_count(), 3);

    let history = harness.orchestrator.history(&job.id).unwrap();
    let fetch_failures = history
        .iter()
        .filter(|e| {
            matches!(
                e.event,
                HistoryEvent::ActivityFailed {
                    step: PipelineStep::Fetch,
                    ..
                }
            )
        })
        .count();
    assert_eq!(fetch_failures, 2);
}

#[tokio::test]
async fn test_fetch_always_failing_fails_job() {
    let harness = TestHarness::new();
    harness.feed.set_failure(FetchError::Timeout(30)).await;

    let job = harness.run("cs").await;

    assert_eq!(job.runtime_status, RuntimeStatus::Failed);
    assert_eq!(job.state, OrchestrationState::Failed);
    assert!(job.output.is_none());
    let error = job.error.expect("failed job has a reason");
    assert!(error.contains("after 3 attempts"), "unexpected error: {}", error);

    assert_eq!(harness.feed.fetch_count(), 3);
    assert_eq!(harness.store.object_count(CONTAINER).await, 0);
}

#[tokio::test]
async fn test_unknown_category_feed_fails_job() {
    let harness = TestHarness::new();

    let job = harness.run("nonexistent").await;

    assert_eq!(job.runtime_status, RuntimeStatus::Failed);
    assert!(job.error.unwrap().contains("404"));
    assert_eq!(harness.store.object_count(CONTAINER).await, 0);
}

#[tokio::test]
async fn test_parse_error_fails_after_one_attempt() {
    let harness = TestHarness::new();
    harness
        .feed
        .set_feed("cs", "<rss><channel><item><title>cut".to_string())
        .await;

    let job = harness.run("cs").await;

    assert_eq!(job.runtime_status, RuntimeStatus::Failed);

    let history = harness.orchestrator.history(&job.id).unwrap();
    let parse_attempts = history
        .iter()
        .filter(|e| {
            matches!(
                e.event,
                HistoryEvent::ActivityScheduled {
                    step: PipelineStep::ParseAndStore,
                    ..
                }
            )
        })
        .count();
    assert_eq!(parse_attempts, 1);

    // The raw payload is stored before parsing and stays for inspection
    let raw_key = keys::raw_key("cs", fixtures::process_date());
    assert!(harness.store.contains(CONTAINER, &raw_key).await);
    assert_eq!(harness.store.object_count(CONTAINER).await, 1);
}

#[tokio::test]
async fn test_non_utf8_feed_is_stored_byte_exact() {
    let harness = TestHarness::new();
    let body: Vec<u8> = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<rss><channel><title>Caf\xe9</title></channel></rss>\n".to_vec();
    harness.feed.set_feed("cs", body.clone()).await;

    let job = harness.run("cs").await;

    // Parsing rejects the encoding, but the source document survives intact.
    assert_eq!(job.runtime_status, RuntimeStatus::Failed);
    let raw_key = keys::raw_key("cs", fixtures::process_date());
    assert_eq!(harness.store.get(CONTAINER, &raw_key).await, Some(body.clone()));

    // The recorded fetch output replays the same bytes.
    let history = harness.orchestrator.history(&job.id).unwrap();
    let recorded = history
        .iter()
        .find_map(|e| match &e.event {
            HistoryEvent::ActivityCompleted {
                output: ActivityOutput::Fetch(feed),
                ..
            } => Some(feed.body.clone()),
            _ => None,
        })
        .expect("fetch output recorded");
    assert_eq!(recorded, body);
}

#[tokio::test]
async fn test_invalid_category_is_rejected_up_front() {
    let harness = TestHarness::new();

    let result = harness
        .orchestrator
        .start_job(JobInput::new("../etc", fixtures::process_date()))
        .await;

    assert!(result.is_err());
    assert_eq!(harness.feed.fetch_count(), 0);
}
