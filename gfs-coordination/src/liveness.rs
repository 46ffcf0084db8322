//! # Liveness registry
//!
//! Tracks the last heartbeat timestamp reported by each chunkserver.
//!
//! Insertion order is preserved deliberately: `/file/create` picks the
//! primary replica as the first live chunkserver in registration order,
//! so the replica set a client sees stays stable as long as the same
//! chunkservers keep heartbeating.

use gfs_core::Port;
use std::time::Duration;
use tokio::sync::RwLock;

/// Registry of chunkserver liveness, keyed by heartbeat recency.
pub struct LivenessRegistry {
    // A Vec rather than a HashMap: cheap at cluster scale, and it gives us
    // the insertion-order iteration the replica-selection policy depends on.
    entries: RwLock<Vec<(Port, u64)>>,
    timeout: Duration,
}

impl LivenessRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            timeout,
        }
    }

    /// Records a heartbeat from `port` at the current wall-clock time,
    /// registering it if this is the first heartbeat seen from it.
    pub async fn record_heartbeat(&self, port: Port) {
        let now = gfs_core::now_millis();
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|(p, _)| *p == port) {
            Some((_, last_seen)) => *last_seen = now,
            None => entries.push((port, now)),
        }
    }

    /// Returns every chunkserver heard from within the liveness timeout, in
    /// the order they first registered.
    pub async fn live_ports(&self) -> Vec<Port> {
        let now = gfs_core::now_millis();
        let timeout_ms = self.timeout.as_millis() as u64;
        self.entries
            .read()
            .await
            .iter()
            .filter(|(_, last_seen)| now.saturating_sub(*last_seen) <= timeout_ms)
            .map(|(port, _)| *port)
            .collect()
    }

    /// Returns `true` if at least one chunkserver is currently live.
    pub async fn has_live_server(&self) -> bool {
        !self.live_ports().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_heartbeat_registers_the_port() {
        let registry = LivenessRegistry::new(Duration::from_secs(10));
        registry.record_heartbeat(9001).await;
        assert_eq!(registry.live_ports().await, vec![9001]);
    }

    #[tokio::test]
    async fn registration_order_is_preserved_across_repeat_heartbeats() {
        let registry = LivenessRegistry::new(Duration::from_secs(10));
        registry.record_heartbeat(9002).await;
        registry.record_heartbeat(9001).await;
        registry.record_heartbeat(9002).await;
        assert_eq!(registry.live_ports().await, vec![9002, 9001]);
    }

    #[tokio::test]
    async fn stale_heartbeats_drop_out_of_the_live_set() {
        let registry = LivenessRegistry::new(Duration::from_millis(0));
        registry.record_heartbeat(9001).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(registry.live_ports().await.is_empty());
        assert!(!registry.has_live_server().await);
    }
}
