//! `reqwest`-backed implementations of the transport traits `gfs-coordination`
//! defines, plus the replication fan-out client. Every call here carries a
//! short deadline and swallows its own errors, peer failures are never
//! allowed to fail the caller.

use gfs_core::{Port, ReplicatedOp};
use gfs_coordination::{ChunkClockTransport, PeerTransport};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct HttpPeerTransport {
    client: reqwest::Client,
    self_port: Port,
    election_deadline: Duration,
}

impl HttpPeerTransport {
    pub fn new(self_port: Port, election_deadline: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            self_port,
            election_deadline,
        }
    }

    fn base_url(peer: Port) -> String {
        format!("http://127.0.0.1:{peer}")
    }

    /// Fans `op` out to every peer in `peers`, best-effort and unordered.
    pub async fn replicate(&self, peers: &[Port], deadline: Duration, op: &ReplicatedOp) {
        let futures = peers.iter().map(|peer| {
            let url = format!("{}/system/replicate", Self::base_url(*peer));
            let client = self.client.clone();
            let op = op.clone();
            async move {
                let result = client
                    .post(&url)
                    .timeout(deadline)
                    .json(&ReplicateRequest { op })
                    .send()
                    .await;
                if let Err(e) = result {
                    warn!(peer, error = %e, "replication call failed, ignoring");
                }
            }
        });
        futures_util::future::join_all(futures).await;
    }
}

#[derive(Serialize)]
struct ReplicateRequest {
    op: ReplicatedOp,
}

#[async_trait::async_trait]
impl PeerTransport for HttpPeerTransport {
    async fn send_election(&self, peer: Port) -> bool {
        let url = format!("{}/election/msg", Self::base_url(peer));
        let body = json!({ "type": "ELECTION", "sender": self.self_port });
        let result = self
            .client
            .post(&url)
            .timeout(self.election_deadline)
            .json(&body)
            .send()
            .await;
        match result {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(peer, error = %e, "election message unanswered");
                false
            }
        }
    }

    async fn send_coordinator(&self, peer: Port, term: u64) {
        let url = format!("{}/election/msg", Self::base_url(peer));
        let body = json!({ "type": "COORDINATOR", "sender": self.self_port, "term": term });
        let result = self
            .client
            .post(&url)
            .timeout(self.election_deadline)
            .json(&body)
            .send()
            .await;
        if let Err(e) = result {
            debug!(peer, error = %e, "coordinator announcement failed, ignoring");
        }
    }

    async fn probe_health(&self, peer: Port) -> bool {
        let url = format!("{}/health", Self::base_url(peer));
        let result = self.client.get(&url).timeout(self.election_deadline).send().await;
        matches!(result, Ok(resp) if resp.status().is_success())
    }
}

#[derive(Clone)]
pub struct HttpChunkClockTransport {
    client: reqwest::Client,
}

impl HttpChunkClockTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn base_url(peer: Port) -> String {
        format!("http://127.0.0.1:{peer}")
    }
}

impl Default for HttpChunkClockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct ClockResponse {
    simulated_time: f64,
}

#[async_trait::async_trait]
impl ChunkClockTransport for HttpChunkClockTransport {
    async fn read_clock(&self, peer: Port) -> Option<f64> {
        let url = format!("{}/admin/clock", Self::base_url(peer));
        let resp = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(1))
            .send()
            .await
            .ok()?;
        resp.json::<ClockResponse>().await.ok().map(|c| c.simulated_time)
    }

    async fn adjust_clock(&self, peer: Port, offset_seconds: f64) {
        let url = format!("{}/admin/adjust-clock", Self::base_url(peer));
        let result = self
            .client
            .post(&url)
            .timeout(Duration::from_millis(500))
            .json(&json!({ "offset": offset_seconds }))
            .send()
            .await;
        if let Err(e) = result {
            debug!(peer, error = %e, "clock adjustment failed, ignoring");
        }
    }
}
