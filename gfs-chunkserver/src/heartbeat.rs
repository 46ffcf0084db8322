//! The chunkserver's background heartbeat loop: an initial random jitter
//! sleep, then a `POST /heartbeat` to every known master every
//! `heartbeat_period`, forever.

use crate::clock::SimulatedClock;
use crate::config::ChunkServerConfig;
use crate::transport::ChunkTransport;
use gfs_core::Port;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Spawns the heartbeat task. Runs until the process exits; there is no
/// graceful shutdown path.
pub fn spawn_heartbeat_loop(
    self_port: Port,
    master_ports: Vec<Port>,
    clock: Arc<SimulatedClock>,
    transport: Arc<ChunkTransport>,
    config: ChunkServerConfig,
) {
    tokio::spawn(async move {
        let jitter = {
            let mut rng = rand::thread_rng();
            let span = config.heartbeat_jitter.end - config.heartbeat_jitter.start;
            config.heartbeat_jitter.start + Duration::from_secs_f64(rng.gen::<f64>() * span.as_secs_f64())
        };
        debug!(self_port, jitter_ms = jitter.as_millis(), "heartbeat loop starting after jitter");
        tokio::time::sleep(jitter).await;

        let mut interval = tokio::time::interval(config.heartbeat_period);
        loop {
            interval.tick().await;
            let simulated_time = clock.now().await;
            for master in &master_ports {
                transport
                    .send_heartbeat(*master, self_port, simulated_time, config.heartbeat_deadline)
                    .await;
            }
        }
    });
}
