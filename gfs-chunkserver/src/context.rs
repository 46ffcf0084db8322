use crate::clock::SimulatedClock;
use crate::config::ChunkServerConfig;
use crate::heartbeat::spawn_heartbeat_loop;
use crate::transport::ChunkTransport;
use gfs_core::{GfsError, Port, Result};
use gfs_storage::ChunkStore;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Per-node shared state for a chunkserver, handed to every `axum` handler
/// via `State<Arc<ChunkServerContext>>`, the chunkserver-side counterpart
/// of `gfs_master::MasterContext`.
pub struct ChunkServerContext {
    pub self_port: Port,
    pub master_ports: Vec<Port>,
    pub config: ChunkServerConfig,
    pub store: Arc<ChunkStore>,
    pub clock: Arc<SimulatedClock>,
    transport: Arc<ChunkTransport>,
    request_count: AtomicU64,
}

impl ChunkServerContext {
    pub async fn new(
        self_port: Port,
        master_ports: Vec<Port>,
        db_path: impl AsRef<Path>,
    ) -> Result<Arc<Self>> {
        let config = ChunkServerConfig::default();
        let store = ChunkStore::open(db_path)
            .await
            .map_err(|e| GfsError::Storage(format!("failed to open chunk store: {e}")))?;

        Ok(Arc::new(Self {
            self_port,
            master_ports,
            config,
            store: Arc::new(store),
            clock: Arc::new(SimulatedClock::new()),
            transport: Arc::new(ChunkTransport::new()),
            request_count: AtomicU64::new(0),
        }))
    }

    /// Spawns the heartbeat background task. Called once at process startup.
    pub fn spawn_background_tasks(self: &Arc<Self>) {
        spawn_heartbeat_loop(
            self.self_port,
            self.master_ports.clone(),
            Arc::clone(&self.clock),
            Arc::clone(&self.transport),
            self.config.clone(),
        );
    }

    /// Counts one inbound HTTP request, for `/admin/status` metrics.
    pub fn count_request(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Forwards a committed write to every secondary in `secondaries`,
    /// best-effort, one at a time, in order.
    pub async fn fan_out_commit(&self, handle: &str, content: &str, secondaries: &[Port]) {
        for secondary in secondaries {
            self.transport
                .forward_commit(*secondary, handle, content, self.config.secondary_commit_deadline)
                .await;
        }
    }
}
