//! # GFS Coordination
//!
//! Cluster coordination for the GFS-style master group:
//!
//! - [`election`]: Bully leader election, keyed by port number.
//! - [`liveness`]: chunkserver heartbeat tracking.
//! - [`lease`]: write-lease grants for chunk primaries.
//! - [`clock`]: leader-driven Berkeley clock synchronization.
//! - [`notifications`]: a small broadcast bus for leadership events.
//!
//! This crate is transport-agnostic: `election` and `clock` depend on
//! `PeerTransport`/`ChunkClockTransport` traits that `gfs-master` implements
//! with `reqwest`, so the Bully and Berkeley algorithms can be tested
//! without a network.

pub mod clock;
pub mod election;
pub mod lease;
pub mod liveness;
pub mod notifications;

pub use clock::{ChunkClockTransport, SYNC_PERIOD};
pub use election::{BullyElection, ElectionState, PeerTransport};
pub use lease::{LeaseManager, LEASE_DURATION};
pub use liveness::LivenessRegistry;
pub use notifications::{CoordinationNotificationBus, LeadershipChange};
