//! Durable ingest work queue
//!
//! A JetStream stream with workqueue retention carries ingest jobs from the
//! gateway to the worker. Delivery is at-least-once: the worker must be
//! idempotent on completed jobs, and messages that exhaust their
//! redeliveries are terminated.

use std::time::Duration;

use async_nats::jetstream::consumer::pull::Config as PullConfig;
use async_nats::jetstream::consumer::PullConsumer;
use async_nats::jetstream::stream::{Config as StreamConfig, RetentionPolicy, StorageType};
use async_nats::jetstream::{self, AckKind, Context};
use futures::StreamExt;

pub use async_nats::jetstream::Message;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mnemo_core::JobType;

/// JetStream stream carrying ingest jobs
pub const STREAM_NAME: &str = "INGEST";
/// Durable consumer shared by all worker processes
pub const CONSUMER_NAME: &str = "ingest-worker";

pub const SUBJECT_DOCUMENT: &str = "ingest.document";
pub const SUBJECT_CODEBASE: &str = "ingest.codebase";

const MAX_STREAM_MESSAGES: i64 = 10_000;

/// Pull timeout used by the worker loop
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Connect error: {0}")]
    Connect(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Consume error: {0}")]
    Consume(String),

    #[error("Ack error: {0}")]
    Ack(String),

    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Message payload carried on the ingest subjects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub job_id: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
}

pub fn subject_for(job_type: JobType) -> &'static str {
    match job_type {
        JobType::Document => SUBJECT_DOCUMENT,
        JobType::Codebase => SUBJECT_CODEBASE,
    }
}

/// Connect to the broker and return a JetStream context
pub async fn connect(url: &str) -> Result<Context, QueueError> {
    let client = async_nats::connect(url)
        .await
        .map_err(|e| QueueError::Connect(e.to_string()))?;
    tracing::info!(url = %url, "Connected to NATS");
    Ok(jetstream::new(client))
}

/// Create the INGEST stream if it does not exist yet
pub async fn ensure_stream(context: &Context) -> Result<(), QueueError> {
    context
        .get_or_create_stream(StreamConfig {
            name: STREAM_NAME.to_string(),
            subjects: vec![SUBJECT_DOCUMENT.into(), SUBJECT_CODEBASE.into()],
            retention: RetentionPolicy::WorkQueue,
            storage: StorageType::File,
            max_messages: MAX_STREAM_MESSAGES,
            ..Default::default()
        })
        .await
        .map_err(|e| QueueError::Stream(e.to_string()))?;
    Ok(())
}

/// Publisher handle used by the gateway
#[derive(Clone)]
pub struct JobQueue {
    context: Context,
}

impl JobQueue {
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    /// Publish a job onto its type's subject
    pub async fn publish(&self, job_id: &str, job_type: JobType) -> Result<(), QueueError> {
        let payload = serde_json::to_vec(&JobPayload {
            job_id: job_id.to_string(),
            job_type,
        })?;

        let ack = self
            .context
            .publish(subject_for(job_type).to_string(), payload.into())
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?;

        tracing::info!(job_id, subject = subject_for(job_type), seq = ack.sequence, "Published job");
        Ok(())
    }
}

/// Durable pull consumer used by the worker
pub struct IngestConsumer {
    consumer: PullConsumer,
}

impl IngestConsumer {
    /// Bind (or create) the durable consumer on the INGEST stream
    pub async fn bind(
        context: &Context,
        ack_wait: Duration,
        max_deliver: i64,
    ) -> Result<Self, QueueError> {
        ensure_stream(context).await?;

        let stream = context
            .get_stream(STREAM_NAME)
            .await
            .map_err(|e| QueueError::Stream(e.to_string()))?;

        let consumer = stream
            .get_or_create_consumer(
                CONSUMER_NAME,
                PullConfig {
                    durable_name: Some(CONSUMER_NAME.to_string()),
                    ack_wait,
                    max_deliver,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| QueueError::Consume(e.to_string()))?;

        Ok(Self { consumer })
    }

    /// Fetch at most one message, waiting up to the pull timeout
    pub async fn fetch_one(&self) -> Result<Option<Message>, QueueError> {
        let mut batch = self
            .consumer
            .fetch()
            .max_messages(1)
            .expires(FETCH_TIMEOUT)
            .messages()
            .await
            .map_err(|e| QueueError::Consume(e.to_string()))?;

        match batch.next().await {
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(e)) => Err(QueueError::Consume(e.to_string())),
            None => Ok(None),
        }
    }
}

/// Acknowledge successful processing
pub async fn ack(message: &Message) -> Result<(), QueueError> {
    message.ack().await.map_err(|e| QueueError::Ack(e.to_string()))
}

/// Negative-acknowledge for redelivery
pub async fn nak(message: &Message) -> Result<(), QueueError> {
    message
        .ack_with(AckKind::Nak(None))
        .await
        .map_err(|e| QueueError::Ack(e.to_string()))
}

/// Terminate: no further delivery of this message
pub async fn term(message: &Message) -> Result<(), QueueError> {
    message
        .ack_with(AckKind::Term)
        .await
        .map_err(|e| QueueError::Ack(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_mapping() {
        assert_eq!(subject_for(JobType::Document), "ingest.document");
        assert_eq!(subject_for(JobType::Codebase), "ingest.codebase");
    }

    #[test]
    fn test_payload_wire_format() {
        let payload = JobPayload {
            job_id: "j-1".to_string(),
            job_type: JobType::Codebase,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"job_id":"j-1","type":"codebase"}"#);

        let back: JobPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.job_type, JobType::Codebase);
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        assert!(serde_json::from_str::<JobPayload>(r#"{"type":"document"}"#).is_err());
        assert!(serde_json::from_str::<JobPayload>("not json").is_err());
    }
}
