//! Memory gateway entry point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use mnemo_config::{load_settings, Settings};
use mnemo_llm::ModelRouter;
use mnemo_memory::{ArchivalClient, EmbeddingClient, MemoryComposer, Promoter, ShortTermMemory};
use mnemo_queue::JobQueue;

mod background;
mod error;
mod routes;
mod state;

use background::BackgroundTasks;
use state::AppState;

/// Default timeout of the shared HTTP client; slower calls set their own
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("MNEMO_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Warning: failed to load config: {e}. Using defaults.");
            Settings::default()
        }
    };

    init_tracing(&settings);
    tracing::info!("Starting memory gateway v{}", env!("CARGO_PKG_VERSION"));

    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

    let persistence = mnemo_persistence::init(&settings.database, None).await?;
    let short_term =
        ShortTermMemory::connect(&settings.redis.url, settings.redis.session_ttl_seconds).await?;

    let queue_context = mnemo_queue::connect(&settings.queue.url).await?;
    mnemo_queue::ensure_stream(&queue_context).await?;
    let queue = JobQueue::new(queue_context);

    let model_router = Arc::new(ModelRouter::from_backends(&settings.backends));
    tracing::info!(models = ?model_router.list(), "Model routes registered");

    let embedder = EmbeddingClient::new(http.clone(), settings.embedding.clone());
    let archival = ArchivalClient::new(http.clone(), settings.archival.url.clone());

    let composer = Arc::new(MemoryComposer::new(
        short_term.clone(),
        persistence.sessions.clone(),
        embedder.clone(),
        archival.clone(),
        settings.memory.recall_top_k,
    ));
    let promoter = Arc::new(Promoter::new(
        persistence.sessions.clone(),
        embedder,
        archival,
        http.clone(),
        settings.summarizer.clone(),
        settings.memory.clone(),
    ));

    let state = AppState {
        settings: Arc::new(settings.clone()),
        http,
        model_router,
        sessions: persistence.sessions,
        documents: persistence.documents,
        jobs: persistence.jobs,
        short_term,
        composer,
        promoter,
        queue,
        background: BackgroundTasks::start(background::DEFAULT_CAPACITY),
    };

    let app = routes::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
    tracing::info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}

fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("mnemo={},tower_http=info", settings.observability.log_level).into()
    });

    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
