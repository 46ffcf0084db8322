//! `reqwest`-backed outbound calls a chunkserver makes: heartbeats to every
//! known master, and commit fanout from a primary to its secondaries. Every
//! call carries a short deadline and swallows its own failure, a master or
//! secondary being unreachable never fails the caller.

use gfs_core::Port;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ChunkTransport {
    client: reqwest::Client,
}

impl Default for ChunkTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn base_url(peer: Port) -> String {
        format!("http://127.0.0.1:{peer}")
    }

    /// Sends one heartbeat to `master`, carrying this node's `port` and
    /// current simulated time. Best-effort: the master might be down.
    pub async fn send_heartbeat(
        &self,
        master: Port,
        self_port: Port,
        simulated_time: f64,
        deadline: Duration,
    ) {
        let url = format!("{}/heartbeat", Self::base_url(master));
        let result = self
            .client
            .post(&url)
            .timeout(deadline)
            .json(&json!({ "port": self_port, "time": simulated_time }))
            .send()
            .await;
        if let Err(e) = result {
            debug!(master, error = %e, "heartbeat unanswered, master may be down");
        }
    }

    /// Forwards a just-committed write to one secondary, carrying the
    /// content along so the secondary can persist it without ever having
    /// staged it directly.
    pub async fn forward_commit(
        &self,
        secondary: Port,
        handle: &str,
        content: &str,
        deadline: Duration,
    ) {
        let url = format!("{}/chunk/commit", Self::base_url(secondary));
        let result = self
            .client
            .post(&url)
            .timeout(deadline)
            .json(&json!({
                "handle": handle,
                "content": content,
                "secondaries": Vec::<Port>::new(),
            }))
            .send()
            .await;
        if let Err(e) = result {
            warn!(secondary, handle, error = %e, "failed to replicate commit to secondary");
        }
    }
}
