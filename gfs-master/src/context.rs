use crate::config::MasterConfig;
use crate::transport::{HttpChunkClockTransport, HttpPeerTransport};
use gfs_core::{GfsError, Port, ReplicatedOp, Result};
use gfs_coordination::{election, clock, BullyElection, LeaseManager, LivenessRegistry};
use gfs_storage::MetadataStore;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Per-node shared state, handed to every `axum` handler via `State<Arc<MasterContext>>`.
/// Each concern (liveness, leases, election) owns its own lock rather than
/// sharing one global mutex, keeping the failure modes of one subsystem from
/// blocking the others.
pub struct MasterContext {
    pub self_port: Port,
    pub peer_ports: Vec<Port>,
    pub config: MasterConfig,
    pub election: Arc<BullyElection<HttpPeerTransport>>,
    pub liveness: Arc<LivenessRegistry>,
    pub leases: Arc<LeaseManager>,
    pub metadata: Arc<MetadataStore>,
    peer_transport: Arc<HttpPeerTransport>,
    request_count: AtomicU64,
}

impl MasterContext {
    pub async fn new(self_port: Port, peer_ports: Vec<Port>, db_path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let config = MasterConfig::default();
        let metadata = MetadataStore::open(db_path)
            .await
            .map_err(|e| GfsError::Storage(format!("failed to open metadata store: {e}")))?;

        let peer_transport = Arc::new(HttpPeerTransport::new(self_port, config.election_deadline));
        let election = Arc::new(BullyElection::new(
            self_port,
            peer_ports.clone(),
            peer_transport.clone(),
        ));
        let liveness = Arc::new(LivenessRegistry::new(config.liveness_timeout));
        let leases = Arc::new(LeaseManager::new(config.lease_duration));

        Ok(Arc::new(Self {
            self_port,
            peer_ports,
            config,
            election,
            liveness,
            leases,
            metadata: Arc::new(metadata),
            peer_transport,
            request_count: AtomicU64::new(0),
        }))
    }

    pub async fn is_leader(&self) -> bool {
        self.election.is_leader().await
    }

    /// Counts one inbound HTTP request, for `/system/status`'s
    /// `algo_status.total_requests` counter.
    pub fn count_request(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Fans a metadata mutation out to every peer master, best-effort.
    pub async fn replicate(&self, op: ReplicatedOp) {
        self.peer_transport
            .replicate(&self.peer_ports, self.config.replicate_deadline, &op)
            .await;
    }

    /// Spawns the election, leader-monitor, and clock-sync background
    /// tasks. Called once at process startup.
    pub fn spawn_background_tasks(self: &Arc<Self>) {
        info!(self_port = self.self_port, peers = ?self.peer_ports, "starting election");
        let election_for_boot = Arc::clone(&self.election);
        tokio::spawn(async move {
            election_for_boot.start_election().await;
        });

        election::spawn_leader_monitor(Arc::clone(&self.election), self.config.monitor_period);

        let ctx = Arc::clone(self);
        let ctx_for_leader_check = Arc::clone(self);
        clock::spawn_clock_sync_loop(
            HttpChunkClockTransport::new(),
            self.config.clock_sync_period,
            move || {
                let ctx = Arc::clone(&ctx);
                async move { ctx.liveness.live_ports().await }
            },
            move || {
                let ctx = Arc::clone(&ctx_for_leader_check);
                async move { ctx.is_leader().await }
            },
        );
    }

    /// Waits, in slices, for at least one chunkserver to become live, the
    /// startup grace period `/file/create` gives a cold cluster.
    pub async fn wait_for_live_chunkserver(&self) -> bool {
        for _ in 0..self.config.file_create_wait_attempts {
            if self.liveness.has_live_server().await {
                return true;
            }
            tokio::time::sleep(self.config.file_create_wait_slice).await;
        }
        self.liveness.has_live_server().await
    }
}
