//! Simulated clock: real wall time plus an adjustable per-node offset.
//!
//! `adjust-clock` accumulates into the offset rather than replacing it.
//! Simulated time is used only for `last_mod` chunk stamps and the
//! clock-sync wire protocol, never for liveness or lease decisions, which
//! always run off real wall time.

use tokio::sync::RwLock;

pub struct SimulatedClock {
    offset_seconds: RwLock<f64>,
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self {
            offset_seconds: RwLock::new(0.0),
        }
    }

    /// Current simulated time: real wall-clock seconds plus the offset.
    pub async fn now(&self) -> f64 {
        gfs_core::now_seconds() as f64 + *self.offset_seconds.read().await
    }

    /// Accumulates `delta` into the offset rather than replacing it.
    pub async fn adjust(&self, delta: f64) {
        *self.offset_seconds.write().await += delta;
    }

    pub async fn offset(&self) -> f64 {
        *self.offset_seconds.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_clock_has_zero_offset() {
        let clock = SimulatedClock::new();
        assert_eq!(clock.offset().await, 0.0);
    }

    #[tokio::test]
    async fn adjustments_accumulate() {
        let clock = SimulatedClock::new();
        clock.adjust(10.0).await;
        clock.adjust(-3.0).await;
        assert_eq!(clock.offset().await, 7.0);
    }

    #[tokio::test]
    async fn now_reflects_the_accumulated_offset() {
        let clock = SimulatedClock::new();
        let before = clock.now().await;
        clock.adjust(100.0).await;
        let after = clock.now().await;
        assert!(after - before >= 99.0);
    }
}
