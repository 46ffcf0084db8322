//! Tunable intervals and timeouts for a master node, collected into one
//! struct with one `Default` impl so the constants governing liveness,
//! leases, election, and clock sync live in one place instead of scattered
//! through the handlers.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MasterConfig {
    /// How long a chunkserver's heartbeat keeps it in the live set.
    pub liveness_timeout: Duration,
    /// Write-lease lifetime.
    pub lease_duration: Duration,
    /// Period of the leader-liveness monitor loop.
    pub monitor_period: Duration,
    /// Period of the leader-only clock-sync loop.
    pub clock_sync_period: Duration,
    /// Deadline for an outbound `ELECTION`/`COORDINATOR`/health-probe call.
    pub election_deadline: Duration,
    /// Deadline for an outbound `/system/replicate` call.
    pub replicate_deadline: Duration,
    /// How long to wait, in slices, for a first chunkserver heartbeat
    /// during `/file/create` before giving up.
    pub file_create_wait_slice: Duration,
    pub file_create_wait_attempts: u32,
    /// Maximum replicas assigned to a newly created chunk.
    pub max_replicas: usize,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            liveness_timeout: Duration::from_secs(10),
            lease_duration: gfs_coordination::LEASE_DURATION,
            monitor_period: Duration::from_secs(3),
            clock_sync_period: gfs_coordination::SYNC_PERIOD,
            election_deadline: Duration::from_secs(1),
            replicate_deadline: Duration::from_millis(500),
            file_create_wait_slice: Duration::from_millis(500),
            file_create_wait_attempts: 8,
            max_replicas: 3,
        }
    }
}
