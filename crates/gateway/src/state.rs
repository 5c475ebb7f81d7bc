//! Application state
//!
//! One context object constructed at startup and cloned into handlers; all
//! process-wide clients live here.

use std::sync::Arc;

use mnemo_config::Settings;
use mnemo_llm::ModelRouter;
use mnemo_memory::{MemoryComposer, Promoter, ShortTermMemory};
use mnemo_persistence::{DocumentStore, JobStore, SessionStore};
use mnemo_queue::JobQueue;

use crate::background::BackgroundTasks;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// One keep-alive HTTP client per process
    pub http: reqwest::Client,
    pub model_router: Arc<ModelRouter>,
    pub sessions: SessionStore,
    pub documents: DocumentStore,
    pub jobs: JobStore,
    pub short_term: ShortTermMemory,
    pub composer: Arc<MemoryComposer>,
    pub promoter: Arc<Promoter>,
    pub queue: JobQueue,
    pub background: BackgroundTasks,
}
