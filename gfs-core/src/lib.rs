//! # GFS Core
//!
//! Shared building blocks for the `gfs-master` and `gfs-chunkserver`
//! binaries: wire types, the client-facing error taxonomy, and the
//! replicated-operation sum type used for leader-to-follower metadata
//! fan-out.

pub mod error;
pub mod replication;
pub mod types;

pub use error::{GfsError, Result};
pub use replication::ReplicatedOp;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_and_chunk_handle_follow_the_original_scheme() {
        let file_id = FileId::generate();
        assert!(file_id.0.starts_with("file_"));

        let handle = ChunkHandle::for_first_chunk(&file_id);
        assert_eq!(handle.0, format!("chunk_{}_0", file_id.0));
    }

    #[test]
    fn access_status_round_trips_through_its_string_form() {
        for status in [
            AccessStatus::Pending,
            AccessStatus::Approved,
            AccessStatus::Rejected,
        ] {
            let parsed = AccessStatus::parse(status.as_str()).unwrap();
            assert_eq!(parsed, status);
        }
        assert!(AccessStatus::parse("bogus").is_none());
    }

    #[test]
    fn not_leader_maps_to_bad_request() {
        use axum::response::IntoResponse;
        let resp = GfsError::NotLeader.into_response();
        assert_eq!(resp.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
