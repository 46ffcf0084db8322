//! # Write leases
//!
//! Tracks which replica holds the write lease for each chunk. A lease is
//! granted to the first entry of a chunk's replica set and expires silently
//! after `LEASE_DURATION`, with no explicit revoke or renewal message. The
//! lease table lives purely in memory on the leader and is never
//! replicated.

use gfs_core::Port;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// The default lease lifetime.
pub const LEASE_DURATION: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Lease {
    primary: Port,
    granted_at_millis: u64,
}

/// In-memory write-lease table, keyed by chunk handle.
pub struct LeaseManager {
    leases: RwLock<HashMap<String, Lease>>,
    duration: Duration,
}

impl LeaseManager {
    pub fn new(duration: Duration) -> Self {
        Self {
            leases: RwLock::new(HashMap::new()),
            duration,
        }
    }

    /// Returns the current primary for `chunk_handle`, granting a fresh
    /// lease to the first entry of `replica_set` if none is held, the
    /// existing one has expired, or its primary has dropped out of
    /// `replica_set`.
    ///
    /// `replica_set` must be non-empty; callers only reach this once
    /// `/file/create` has confirmed at least one chunkserver is live.
    pub async fn grant_lease(&self, chunk_handle: &str, replica_set: &[Port]) -> Port {
        let now = gfs_core::now_millis();
        let mut leases = self.leases.write().await;

        if let Some(lease) = leases.get(chunk_handle) {
            let age_ms = now.saturating_sub(lease.granted_at_millis);
            let still_valid = age_ms < self.duration.as_millis() as u64
                && replica_set.contains(&lease.primary);
            if still_valid {
                return lease.primary;
            }
        }

        let primary = replica_set[0];
        leases.insert(
            chunk_handle.to_string(),
            Lease {
                primary,
                granted_at_millis: now,
            },
        );
        primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_grant_picks_the_first_replica() {
        let manager = LeaseManager::new(LEASE_DURATION);
        let primary = manager.grant_lease("chunk_file_1_0", &[9001, 9002, 9003]).await;
        assert_eq!(primary, 9001);
    }

    #[tokio::test]
    async fn repeated_grant_within_duration_returns_same_primary() {
        let manager = LeaseManager::new(LEASE_DURATION);
        let first = manager.grant_lease("chunk_file_1_0", &[9001, 9002]).await;
        let second = manager.grant_lease("chunk_file_1_0", &[9002, 9001]).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn expired_lease_is_regranted_from_the_current_replica_set() {
        let manager = LeaseManager::new(Duration::from_millis(0));
        let first = manager.grant_lease("chunk_file_1_0", &[9001, 9002]).await;
        assert_eq!(first, 9001);
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = manager.grant_lease("chunk_file_1_0", &[9002, 9001]).await;
        assert_eq!(second, 9002);
    }

    #[tokio::test]
    async fn unexpired_lease_is_regranted_once_its_primary_leaves_the_replica_set() {
        let manager = LeaseManager::new(LEASE_DURATION);
        let first = manager.grant_lease("chunk_file_1_0", &[9001, 9002]).await;
        assert_eq!(first, 9001);

        let second = manager.grant_lease("chunk_file_1_0", &[9002, 9003]).await;
        assert_eq!(second, 9002);
    }
}
