//! # Replicated operations
//!
//! Wire representation of leader-to-follower metadata replication.
//!
//! One enum variant per mutating master operation, so that a follower
//! applies the *operation*, not a raw query string, through the same store
//! method the leader used locally.

use crate::types::{AccessStatus, ChunkMapping, FileId, FileRecord, RequestId, UserId};
use serde::{Deserialize, Serialize};

/// A single metadata mutation, fanned out from the leader to every peer
/// master via `POST /system/replicate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReplicatedOp {
    RegisterUser {
        user_id: UserId,
        username: String,
        password_digest: String,
    },
    CreateFile {
        file: FileRecord,
    },
    CreateChunkMapping {
        mapping: ChunkMapping,
    },
    RequestAccess {
        request_id: RequestId,
        file_id: FileId,
        user_id: UserId,
        access_type: String,
    },
    SetAccessStatus {
        request_id: RequestId,
        status: AccessStatus,
    },
}
