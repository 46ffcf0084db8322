//! # Core Types
//!
//! Fundamental types shared between the master and chunkserver binaries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identity of a node (master or chunkserver) in the cluster.
///
/// Nodes are identified purely by the TCP port they listen on. There is no
/// separate identity namespace; a higher port always wins Bully elections.
pub type Port = u16;

/// Milliseconds since the Unix epoch. Used for liveness/lease bookkeeping,
/// which always runs off real wall time (never "simulated time").
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}

/// Seconds since the Unix epoch, used to derive `file_id`s.
pub fn now_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// Opaque identifier for a file, e.g. `file_1732481920`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub String);

impl FileId {
    /// Allocates a new file id from the current wall clock. Two files
    /// created in the same second collide, a deliberately preserved
    /// limitation rather than a bug.
    pub fn generate() -> Self {
        Self(format!("file_{}", now_seconds()))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier for a single chunk, e.g. `chunk_file_1732481920_0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkHandle(pub String);

impl ChunkHandle {
    pub fn for_first_chunk(file_id: &FileId) -> Self {
        Self(format!("chunk_{}_0", file_id.0))
    }
}

impl fmt::Display for ChunkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier for a registered user. A random UUID, rendered as a
/// string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier for a permission request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a [`PermissionRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessStatus {
    Pending,
    Approved,
    Rejected,
}

impl AccessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessStatus::Pending => "PENDING",
            AccessStatus::Approved => "APPROVED",
            AccessStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted file record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: FileId,
    pub filename: String,
    pub size: u64,
    pub owner_id: UserId,
}

/// A persisted chunk-to-replica mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMapping {
    pub chunk_handle: ChunkHandle,
    pub file_id: FileId,
    pub sequence_index: u32,
    pub primary_location: Port,
    pub replica_set: Vec<Port>,
}

/// A persisted permission request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub request_id: RequestId,
    pub file_id: FileId,
    pub user_id: UserId,
    pub access_type: String,
    pub status: AccessStatus,
}
