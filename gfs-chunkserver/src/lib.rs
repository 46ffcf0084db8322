//! # GFS Chunkserver
//!
//! The chunk payload server binary's library half: CLI-independent so the
//! `axum::Router` can be exercised directly in tests via
//! `tower::ServiceExt::oneshot`, matching `gfs-master`'s habit of keeping
//! binaries thin over a testable library crate.

pub mod clock;
pub mod config;
pub mod context;
pub mod heartbeat;
pub mod http;
pub mod transport;

pub use config::ChunkServerConfig;
pub use context::ChunkServerContext;
