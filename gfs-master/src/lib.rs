//! # GFS Master
//!
//! The metadata master binary's library half: CLI-independent so the
//! `axum::Router` can be exercised directly in tests via
//! `tower::ServiceExt::oneshot`, keeping the binary thin over a testable
//! library crate.

pub mod auth;
pub mod config;
pub mod context;
pub mod http;
pub mod transport;

pub use config::MasterConfig;
pub use context::MasterContext;
