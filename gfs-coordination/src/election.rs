//! # Bully leader election
//!
//! Masters are totally ordered by port number, and a node that notices no
//! higher-ported peer is alive declares itself leader without waiting to
//! see whether one of those peers is merely slow to answer. This keeps the
//! classic algorithm's weakness deliberately rather than "fixing" it into
//! the textbook bounded-wait variant.

use gfs_core::Port;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::notifications::{CoordinationNotificationBus, LeadershipChange};

/// Where a node believes itself to stand in the current term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionState {
    /// No election has run yet, or the last one this node started is still
    /// waiting on OK replies from higher-ported peers.
    InProgress { term: u64 },
    /// This node declared victory and believes it is the leader.
    Leader { term: u64 },
    /// `leader` answered a coordinator message or out-ranked us in an
    /// election round.
    Follower { leader: Port, term: u64 },
}

/// Abstraction over the master-to-master HTTP calls the Bully algorithm
/// needs. Implemented with `reqwest` in `gfs-master`; kept as a trait here
/// so this crate stays free of any particular HTTP client.
#[async_trait::async_trait]
pub trait PeerTransport: Send + Sync {
    /// Sends an election message to `peer`, returning `true` if it answered
    /// with an OK (i.e. it is alive and will take over the election).
    async fn send_election(&self, peer: Port) -> bool;

    /// Announces this node as the new coordinator. Best-effort: the callee
    /// never reports failure back to the caller.
    async fn send_coordinator(&self, peer: Port, term: u64);

    /// Probes whether `peer` (normally the current leader) is still
    /// reachable. Used by the leader-liveness monitor.
    async fn probe_health(&self, peer: Port) -> bool;
}

/// Runs the Bully algorithm for a single master, keyed by its own port and
/// the set of peer ports in the cluster.
pub struct BullyElection<T: PeerTransport> {
    self_port: Port,
    peers: Vec<Port>,
    transport: Arc<T>,
    state: RwLock<ElectionState>,
    term: RwLock<u64>,
    notifications: Arc<CoordinationNotificationBus>,
}

impl<T: PeerTransport> BullyElection<T> {
    pub fn new(self_port: Port, peers: Vec<Port>, transport: Arc<T>) -> Self {
        Self {
            self_port,
            peers,
            transport,
            state: RwLock::new(ElectionState::InProgress { term: 0 }),
            term: RwLock::new(0),
            notifications: Arc::new(CoordinationNotificationBus::new()),
        }
    }

    pub fn notifications(&self) -> Arc<CoordinationNotificationBus> {
        Arc::clone(&self.notifications)
    }

    pub async fn state(&self) -> ElectionState {
        self.state.read().await.clone()
    }

    pub async fn is_leader(&self) -> bool {
        matches!(*self.state.read().await, ElectionState::Leader { .. })
    }

    pub async fn current_leader(&self) -> Option<Port> {
        match &*self.state.read().await {
            ElectionState::Leader { .. } => Some(self.self_port),
            ElectionState::Follower { leader, .. } => Some(*leader),
            ElectionState::InProgress { .. } => None,
        }
    }

    fn higher_peers(&self) -> Vec<Port> {
        self.peers
            .iter()
            .copied()
            .filter(|p| *p > self.self_port)
            .collect()
    }

    /// Starts (or restarts) an election round. Sends election messages to
    /// every higher-ported peer; if none answers OK, declares victory
    /// immediately, the unbounded-wait Bully behavior.
    pub async fn start_election(&self) {
        let term = {
            let mut term = self.term.write().await;
            *term += 1;
            *term
        };
        *self.state.write().await = ElectionState::InProgress { term };
        self.notifications
            .notify(LeadershipChange::ElectionStarted { term })
            .await;

        let higher = self.higher_peers();
        if higher.is_empty() {
            self.declare_victory(term).await;
            return;
        }

        let mut any_answered = false;
        for peer in higher {
            if self.transport.send_election(peer).await {
                any_answered = true;
                debug!(peer, "higher peer answered election message");
            }
        }

        if !any_answered {
            self.declare_victory(term).await;
        }
        // If a higher peer answered, it takes over the election and will
        // eventually broadcast a coordinator message; this node just waits.
    }

    async fn declare_victory(&self, term: u64) {
        info!(self_port = self.self_port, term, "declaring election victory");
        *self.state.write().await = ElectionState::Leader { term };
        self.notifications
            .notify(LeadershipChange::LeaderElected {
                port: self.self_port,
                term,
            })
            .await;

        for peer in &self.peers {
            self.transport.send_coordinator(*peer, term).await;
        }
    }

    /// Handles an incoming election message from a lower-ported peer: reply
    /// OK (the caller does that) and take over the election ourselves.
    pub async fn handle_election_message(&self, from: Port) {
        if from >= self.self_port {
            warn!(from, self_port = self.self_port, "election message from non-lower peer, ignoring");
            return;
        }
        self.start_election().await;
    }

    /// Handles an incoming coordinator announcement: step down to follower
    /// unless we outrank the announced leader.
    pub async fn handle_coordinator_message(&self, leader: Port, term: u64) {
        if leader < self.self_port {
            debug!(leader, self_port = self.self_port, "ignoring coordinator from lower peer");
            return;
        }
        let mut term_guard = self.term.write().await;
        if term < *term_guard {
            return;
        }
        *term_guard = term;
        drop(term_guard);

        *self.state.write().await = ElectionState::Follower { leader, term };
        self.notifications
            .notify(LeadershipChange::FollowingNewLeader { leader, term })
            .await;
    }

}

/// Spawns the background task that periodically checks whether the leader
/// (if we're a follower) is still reachable, triggering a fresh election if
/// not, and retrying whenever the leader is unknown. Runs every
/// `check_interval`.
pub fn spawn_leader_monitor<T: PeerTransport + 'static>(
    election: Arc<BullyElection<T>>,
    check_interval: Duration,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(check_interval);
        loop {
            interval.tick().await;
            let state = election.state().await;
            match state {
                ElectionState::Leader { .. } => {}
                ElectionState::InProgress { .. } => {
                    warn!("leader unknown, starting new election");
                    election.start_election().await;
                }
                ElectionState::Follower { leader, .. } => {
                    if !election.transport.probe_health(leader).await {
                        warn!(leader, "leader unreachable, starting new election");
                        election.start_election().await;
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoPeers;

    #[async_trait::async_trait]
    impl PeerTransport for NoPeers {
        async fn send_election(&self, _peer: Port) -> bool {
            false
        }
        async fn send_coordinator(&self, _peer: Port, _term: u64) {}
        async fn probe_health(&self, _peer: Port) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn highest_port_with_no_peers_declares_itself_leader() {
        let election = BullyElection::new(9003, vec![], Arc::new(NoPeers));
        election.start_election().await;
        assert!(election.is_leader().await);
        assert_eq!(election.current_leader().await, Some(9003));
    }

    struct AllSilent;

    #[async_trait::async_trait]
    impl PeerTransport for AllSilent {
        async fn send_election(&self, _peer: Port) -> bool {
            false
        }
        async fn send_coordinator(&self, _peer: Port, _term: u64) {}
        async fn probe_health(&self, _peer: Port) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn self_declares_victory_when_no_higher_peer_answers() {
        let election = BullyElection::new(9001, vec![9002, 9003], Arc::new(AllSilent));
        election.start_election().await;
        assert!(election.is_leader().await);
    }

    struct OneAlivePeer {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PeerTransport for OneAlivePeer {
        async fn send_election(&self, _peer: Port) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            true
        }
        async fn send_coordinator(&self, _peer: Port, _term: u64) {}
        async fn probe_health(&self, _peer: Port) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn defers_when_a_higher_peer_answers() {
        let transport = Arc::new(OneAlivePeer {
            calls: AtomicUsize::new(0),
        });
        let election = BullyElection::new(9001, vec![9002], transport.clone());
        election.start_election().await;
        assert!(!election.is_leader().await);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn lower_peer_coordinator_message_is_ignored() {
        let election = BullyElection::new(9002, vec![9001, 9003], Arc::new(NoPeers));
        election.handle_coordinator_message(9001, 1).await;
        assert!(!matches!(election.state().await, ElectionState::Follower { .. }));
    }

    #[tokio::test]
    async fn higher_peer_coordinator_message_is_accepted() {
        let election = BullyElection::new(9001, vec![9002, 9003], Arc::new(NoPeers));
        election.handle_coordinator_message(9003, 1).await;
        assert_eq!(election.current_leader().await, Some(9003));
    }
}
