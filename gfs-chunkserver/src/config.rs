//! Tunable intervals and deadlines for a chunkserver node, collected the
//! same way `gfs_master::MasterConfig` collects its constants: one struct,
//! one `Default` impl.

use std::ops::Range;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ChunkServerConfig {
    /// Period between heartbeat rounds, after the initial jitter sleep.
    pub heartbeat_period: Duration,
    /// Random startup delay before the first heartbeat, to avoid a
    /// thundering herd against the masters when a cluster boots at once.
    pub heartbeat_jitter: Range<Duration>,
    /// Deadline for a single `POST /heartbeat` call to one master.
    pub heartbeat_deadline: Duration,
    /// Deadline for a single secondary-fanout `POST /chunk/commit` call.
    pub secondary_commit_deadline: Duration,
}

impl Default for ChunkServerConfig {
    fn default() -> Self {
        Self {
            heartbeat_period: Duration::from_secs(5),
            heartbeat_jitter: Duration::from_millis(500)..Duration::from_millis(3000),
            heartbeat_deadline: Duration::from_millis(500),
            secondary_commit_deadline: Duration::from_secs(1),
        }
    }
}
