//! # Berkeley clock synchronization
//!
//! The leader periodically polls every live chunkserver's simulated clock,
//! averages the readings against its own, and pushes each chunkserver the
//! delta needed to converge on that average, a textbook Berkeley algorithm
//! run only by whichever master currently holds leadership.

use gfs_core::Port;
use std::time::Duration;

/// The default period between synchronization rounds.
pub const SYNC_PERIOD: Duration = Duration::from_secs(10);

/// Abstraction over the chunkserver clock RPCs a Berkeley round needs.
/// Implemented with `reqwest` in `gfs-chunkserver`'s peers, called from
/// `gfs-master`.
#[async_trait::async_trait]
pub trait ChunkClockTransport: Send + Sync {
    /// Reads `peer`'s simulated clock, in seconds since the epoch. `None`
    /// if the peer didn't answer in time.
    async fn read_clock(&self, peer: Port) -> Option<f64>;

    /// Applies a clock offset (in seconds, possibly negative) to `peer`.
    /// Best-effort: failures are not reported back to the caller.
    async fn adjust_clock(&self, peer: Port, offset_seconds: f64);
}

/// One Berkeley round: given the leader's own clock reading (`leader_time`,
/// the anchor, never adjusted) and every live chunkserver's clock reading,
/// compute each peer's diff from the anchor, average the diffs across the
/// peers that answered, and return the `(peer, offset)` deltas that nudge
/// each one toward that average.
///
/// The leader does not contribute its own (implicitly zero) diff to the
/// average, only the peers that actually answered do. A peer that fails to
/// answer contributes no reading and receives no adjustment.
pub fn compute_adjustments(leader_time: f64, readings: &[(Port, Option<f64>)]) -> Vec<(Port, f64)> {
    let diffs: Vec<(Port, f64)> = readings
        .iter()
        .filter_map(|(peer, reading)| reading.map(|t| (*peer, t - leader_time)))
        .collect();

    if diffs.is_empty() {
        return Vec::new();
    }
    let avg_diff = diffs.iter().map(|(_, d)| d).sum::<f64>() / diffs.len() as f64;

    diffs
        .into_iter()
        .map(|(peer, diff)| (peer, avg_diff - diff))
        .collect()
}

/// Runs one full synchronization round against `peers` via `transport`,
/// using `leader_time` as the leader's own simulated clock reading.
pub async fn run_sync_round<T: ChunkClockTransport>(transport: &T, leader_time: f64, peers: &[Port]) {
    let mut readings = Vec::with_capacity(peers.len());
    for peer in peers {
        readings.push((*peer, transport.read_clock(*peer).await));
    }

    let adjustments = compute_adjustments(leader_time, &readings);
    for (peer, offset) in adjustments {
        transport.adjust_clock(peer, offset).await;
    }
}

/// Spawns the leader-only background loop that runs a sync round every
/// `period`, as long as `is_leader` keeps resolving to `true`.
pub fn spawn_clock_sync_loop<T, F, Fut, L, LFut>(
    transport: T,
    period: Duration,
    peers_fn: F,
    is_leader: L,
) where
    T: ChunkClockTransport + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Vec<Port>> + Send,
    L: Fn() -> LFut + Send + 'static,
    LFut: std::future::Future<Output = bool> + Send,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if !is_leader().await {
                continue;
            }
            let leader_time = gfs_core::now_seconds() as f64;
            let peers = peers_fn().await;
            run_sync_round(&transport, leader_time, &peers).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_is_taken_over_peer_diffs_only() {
        let readings = vec![(9001, Some(100.0)), (9002, Some(102.0))];
        let adjustments = compute_adjustments(98.0, &readings);
        // diffs: 9001 -> 2, 9002 -> 4; avg_diff = 3
        assert_eq!(adjustments, vec![(9001, 1.0), (9002, -1.0)]);
    }

    #[test]
    fn unreachable_peers_are_skipped_entirely() {
        let readings = vec![(9001, Some(100.0)), (9002, None)];
        let adjustments = compute_adjustments(100.0, &readings);
        assert_eq!(adjustments, vec![(9001, 0.0)]);
    }

    #[test]
    fn single_live_peer_receives_a_zero_adjustment() {
        let readings = vec![(9001, Some(107.0))];
        let adjustments = compute_adjustments(100.0, &readings);
        assert_eq!(adjustments, vec![(9001, 0.0)]);
    }

    #[test]
    fn no_live_peers_yields_no_adjustments() {
        let readings: Vec<(Port, Option<f64>)> = vec![(9001, None)];
        assert!(compute_adjustments(100.0, &readings).is_empty());
    }

    #[tokio::test]
    async fn full_round_applies_computed_offsets() {
        use std::sync::Mutex;

        struct Recorder {
            clocks: Mutex<std::collections::HashMap<Port, f64>>,
            applied: Mutex<Vec<(Port, f64)>>,
        }

        #[async_trait::async_trait]
        impl ChunkClockTransport for Recorder {
            async fn read_clock(&self, peer: Port) -> Option<f64> {
                self.clocks.lock().unwrap().get(&peer).copied()
            }
            async fn adjust_clock(&self, peer: Port, offset_seconds: f64) {
                self.applied.lock().unwrap().push((peer, offset_seconds));
            }
        }

        let mut clocks = std::collections::HashMap::new();
        clocks.insert(9001, 100.0);
        clocks.insert(9002, 104.0);
        let recorder = Recorder {
            clocks: Mutex::new(clocks),
            applied: Mutex::new(Vec::new()),
        };

        run_sync_round(&recorder, 100.0, &[9001, 9002]).await;

        let applied = recorder.applied.lock().unwrap().clone();
        // diffs: 9001 -> 0, 9002 -> 4; avg_diff = 2
        assert_eq!(applied, vec![(9001, 2.0), (9002, -2.0)]);
    }
}
