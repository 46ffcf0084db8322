//! # Coordination notifications
//!
//! A small broadcast bus for election events, used by `/system/status` to
//! report recent leadership activity and by tests that want to observe an
//! election without polling `BullyElection::state`.

use gfs_core::Port;
use tokio::sync::broadcast;

/// A leadership-related event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadershipChange {
    ElectionStarted { term: u64 },
    LeaderElected { port: Port, term: u64 },
    FollowingNewLeader { leader: Port, term: u64 },
}

/// Broadcast bus for [`LeadershipChange`] events.
pub struct CoordinationNotificationBus {
    tx: broadcast::Sender<LeadershipChange>,
}

impl Default for CoordinationNotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinationNotificationBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LeadershipChange> {
        self.tx.subscribe()
    }

    /// Publishes an event. A send with no subscribers is not an error,
    /// nothing has to be listening for leadership changes to happen.
    pub async fn notify(&self, change: LeadershipChange) {
        let _ = self.tx.send(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = CoordinationNotificationBus::new();
        let mut rx = bus.subscribe();
        bus.notify(LeadershipChange::LeaderElected { port: 9003, term: 1 })
            .await;
        assert_eq!(
            rx.recv().await.unwrap(),
            LeadershipChange::LeaderElected { port: 9003, term: 1 }
        );
    }
}
