//! Service state

use mnemo_memory::ArchivalClient;

#[derive(Clone)]
pub struct ServiceState {
    /// Client for the knowledge-graph store all documents are forwarded to
    pub archival: ArchivalClient,
}
