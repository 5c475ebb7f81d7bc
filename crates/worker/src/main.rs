//! Ingest worker entry point
//!
//! Single-threaded pull loop over the durable consumer: fetch one message,
//! run it through the job state machine, repeat. Multiple worker processes
//! share the same durable consumer.

use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use mnemo_config::{load_settings, Settings};
use mnemo_queue::IngestConsumer;

mod processor;

use processor::{handle_message, WorkerContext};

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
    tracing::info!("Starting ingest worker v{}", env!("CARGO_PKG_VERSION"));

    let persistence =
        mnemo_persistence::init(&settings.database, Some(settings.worker.max_db_connections))
            .await?;

    let queue_context = mnemo_queue::connect(&settings.queue.url).await?;
    let consumer = IngestConsumer::bind(
        &queue_context,
        Duration::from_secs(settings.worker.ack_wait_seconds),
        settings.worker.max_redeliveries,
    )
    .await?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()?;

    let ctx = WorkerContext {
        jobs: persistence.jobs,
        documents: persistence.documents,
        http,
        preprocessor_url: settings.preprocessor.url.clone(),
        batch_size: settings.worker.batch_size,
        max_redeliveries: settings.worker.max_redeliveries,
    };

    tracing::info!("Ingest worker ready, waiting for jobs");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            fetched = consumer.fetch_one() => {
                match fetched {
                    Ok(Some(message)) => handle_message(&ctx, &message).await,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::error!(error = %e, "Fetch failed");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }

    tracing::info!("Ingest worker shutdown complete");
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
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("mnemo={}", settings.observability.log_level).into());

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
