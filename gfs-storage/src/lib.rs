//! # GFS Storage
//!
//! Durable persistence for the GFS-style master ([`metadata`]) and
//! chunkserver ([`chunks`]). Both stores wrap a synchronous
//! `rusqlite::Connection` behind `spawn_blocking`, each node keeping its own
//! local `sqlite3` file rather than a single shared log.

pub mod chunks;
pub mod metadata;

pub use chunks::ChunkStore;
pub use metadata::MetadataStore;
