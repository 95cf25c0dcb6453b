use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedline_core::{
    config::StorageBackend, load_config, validate_config, Activities, FeedSource, FsObjectStore,
    HttpFeedSource, JobOrchestrator, JobStore, LlmClient, ObjectStore, OpenAiCompatClient,
    Simplifier, SqliteJobStore, StoreGateway,
};

use feedline_server::api::create_router;
use feedline_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("FEEDLINE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    info!("Database path: {:?}", config.database.path);

    // Job history
    let job_store: Arc<dyn JobStore> = Arc::new(
        SqliteJobStore::new(&config.database.path).context("Failed to create job store")?,
    );
    info!("Job store initialized");

    // Object store
    let object_store: Arc<dyn ObjectStore> = match config.storage.backend {
        StorageBackend::Filesystem => {
            info!(
                "Using filesystem object store at {:?}",
                config.storage.root
            );
            Arc::new(FsObjectStore::new(config.storage.root.clone()))
        }
    };
    let gateway = StoreGateway::new(object_store, config.storage.container.clone());
    gateway
        .ensure_container()
        .await
        .with_context(|| format!("Failed to create container '{}'", gateway.container()))?;

    // Feed source
    let feed_source: Arc<dyn FeedSource> = Arc::new(
        HttpFeedSource::new(config.feed.clone()).context("Failed to create feed client")?,
    );
    info!("Fetching feeds from {}", config.feed.base_url);

    // Orchestrator
    let activities = Activities::new(feed_source, gateway.clone(), config.pipeline.clone());
    let orchestrator = Arc::new(JobOrchestrator::new(
        job_store,
        activities,
        config.retry.clone(),
    ));
    let resumed = orchestrator
        .resume_incomplete()
        .await
        .context("Failed to resume incomplete jobs")?;
    info!("Job orchestrator started ({} jobs resumed)", resumed);

    // Text simplification, only with an [llm] section
    let simplifier = match &config.llm {
        Some(llm_config) => {
            let client: Arc<dyn LlmClient> = Arc::new(
                OpenAiCompatClient::new(llm_config).context("Failed to create LLM client")?,
            );
            info!(
                "Text simplification enabled ({} via {})",
                client.model(),
                llm_config.api_base
            );
            Some(Arc::new(Simplifier::new(
                client,
                gateway.clone(),
                llm_config.clone(),
            )))
        }
        None => {
            info!("Text simplification not configured");
            None
        }
    };

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&orchestrator),
        gateway,
        simplifier,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Unfinished jobs pick up again from history on the next start
    info!("Stopping orchestrator...");
    orchestrator.stop().await;
    info!("Server shut down");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
