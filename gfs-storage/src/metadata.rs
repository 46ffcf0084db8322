//! # Metadata store
//!
//! SQLite-backed persistence for the master's users/files/chunk-mapping/
//! permission tables. Every mutating method here corresponds to one
//! [`gfs_core::ReplicatedOp`] variant, so the leader and its followers
//! reach identical state by calling the same method with the same
//! arguments.
//!
//! `rusqlite::Connection` is synchronous; every query runs inside
//! `spawn_blocking` so it never stalls the async runtime.

use gfs_core::{
    AccessStatus, ChunkHandle, ChunkMapping, FileId, FileRecord, GfsError, PermissionRequest,
    Result, UserId,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite-backed store for all master metadata.
pub struct MetadataStore {
    conn: Arc<Mutex<Connection>>,
}

impl MetadataStore {
    /// Opens (creating if necessary) the metadata database at `path` and
    /// runs its schema migration.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> rusqlite::Result<Connection> {
            let conn = Connection::open(path)?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .expect("metadata store open task panicked")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// An in-memory store, for tests.
    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio::task::spawn_blocking(|| -> rusqlite::Result<Connection> {
            let conn = Connection::open_in_memory()?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .expect("metadata store open task panicked")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<F, T>(&self, f: F) -> rusqlite::Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().expect("metadata connection mutex poisoned");
            f(&guard)
        })
        .await
        .expect("metadata store worker task panicked")
    }

    pub async fn register_user(
        &self,
        user_id: &UserId,
        username: &str,
        password_digest: &str,
    ) -> Result<()> {
        let (user_id, username_owned, digest) = (
            user_id.0.clone(),
            username.to_string(),
            password_digest.to_string(),
        );
        let username_for_error = username.to_string();
        let outcome = self
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO users (user_id, username, password_digest) VALUES (?1, ?2, ?3)",
                    params![user_id, username_owned, digest],
                )
            })
            .await;

        match outcome {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(GfsError::Duplicate(username_for_error)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn authenticate(&self, username: &str, password_digest: &str) -> Result<UserId> {
        let (username, digest) = (username.to_string(), password_digest.to_string());
        let outcome = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT user_id FROM users WHERE username = ?1 AND password_digest = ?2",
                    params![username, digest],
                    |row| row.get::<_, String>(0),
                )
            })
            .await;

        match outcome {
            Ok(user_id) => Ok(UserId(user_id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(GfsError::InvalidCredentials),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn create_file(&self, file: &FileRecord) -> Result<()> {
        let (file_id, filename, size, owner_id) = (
            file.file_id.0.clone(),
            file.filename.clone(),
            file.size,
            file.owner_id.0.clone(),
        );
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO files (file_id, filename, size, owner_id) VALUES (?1, ?2, ?3, ?4)",
                params![file_id, filename, size, owner_id],
            )
        })
        .await?;
        Ok(())
    }

    pub async fn lookup_file(&self, file_id: &FileId) -> Result<Option<FileRecord>> {
        let file_id = file_id.0.clone();
        let record = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT file_id, filename, size, owner_id FROM files WHERE file_id = ?1",
                    params![file_id],
                    row_to_file_record,
                )
                .optional()
            })
            .await?;
        Ok(record)
    }

    pub async fn list_files(&self, owner_id: &UserId) -> Result<Vec<FileRecord>> {
        let owner_id = owner_id.0.clone();
        let records = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT file_id, filename, size, owner_id FROM files WHERE owner_id = ?1",
                )?;
                let rows = stmt.query_map(params![owner_id], row_to_file_record)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;
        Ok(records)
    }

    /// Files `user_id` can read via an APPROVED permission request, but
    /// does not own, the other half of `/file/list/{user_id}`.
    pub async fn shared_files_for(&self, user_id: &UserId) -> Result<Vec<FileRecord>> {
        let user_id = user_id.0.clone();
        let records = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT f.file_id, f.filename, f.size, f.owner_id \
                     FROM files f JOIN permissions p ON f.file_id = p.file_id \
                     WHERE p.user_id = ?1 AND p.status = 'APPROVED'",
                )?;
                let rows = stmt.query_map(params![user_id], row_to_file_record)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;
        Ok(records)
    }

    pub async fn create_chunk_mapping(&self, mapping: &ChunkMapping) -> Result<()> {
        let chunk_handle = mapping.chunk_handle.0.clone();
        let file_id = mapping.file_id.0.clone();
        let sequence_index = mapping.sequence_index;
        let primary_location = mapping.primary_location;
        let replica_set = encode_replica_set(&mapping.replica_set);

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO chunk_mapping \
                 (chunk_handle, file_id, sequence_index, primary_location, replica_set) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![chunk_handle, file_id, sequence_index, primary_location, replica_set],
            )
        })
        .await?;
        Ok(())
    }

    pub async fn chunk_mapping(&self, chunk_handle: &ChunkHandle) -> Result<Option<ChunkMapping>> {
        let chunk_handle = chunk_handle.0.clone();
        let mapping = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT chunk_handle, file_id, sequence_index, primary_location, replica_set \
                     FROM chunk_mapping WHERE chunk_handle = ?1",
                    params![chunk_handle],
                    row_to_chunk_mapping,
                )
                .optional()
            })
            .await?;
        Ok(mapping)
    }

    pub async fn request_access(&self, request: &PermissionRequest) -> Result<()> {
        let (request_id, file_id, user_id, access_type, status) = (
            request.request_id.0.clone(),
            request.file_id.0.clone(),
            request.user_id.0.clone(),
            request.access_type.clone(),
            request.status.as_str(),
        );
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO permissions \
                 (request_id, file_id, user_id, access_type, status) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![request_id, file_id, user_id, access_type, status],
            )
        })
        .await?;
        Ok(())
    }

    /// Pending requests against files owned by `owner_id`, the set an owner
    /// sees when polling `/access/pending/{owner_user_id}`.
    pub async fn pending_requests_for_owner(
        &self,
        owner_id: &UserId,
    ) -> Result<Vec<PermissionRequest>> {
        let owner_id = owner_id.0.clone();
        let requests = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT p.request_id, p.file_id, p.user_id, p.access_type, p.status \
                     FROM permissions p JOIN files f ON p.file_id = f.file_id \
                     WHERE f.owner_id = ?1 AND p.status = 'PENDING'",
                )?;
                let rows = stmt.query_map(params![owner_id], row_to_permission_request)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;
        Ok(requests)
    }

    pub async fn set_access_status(
        &self,
        request_id: &gfs_core::RequestId,
        status: AccessStatus,
    ) -> Result<()> {
        let request_id_owned = request_id.0.clone();
        let status_str = status.as_str();
        let rows_changed = self
            .with_conn(move |conn| {
                conn.execute(
                    "UPDATE permissions SET status = ?1 WHERE request_id = ?2",
                    params![status_str, request_id_owned],
                )
            })
            .await?;

        if rows_changed == 0 {
            return Err(GfsError::NotFound(format!(
                "permission request {}",
                request_id.0
            )));
        }
        Ok(())
    }

    /// Whether `user_id` may read `file_id`: owners always can, everyone
    /// else needs an approved permission request.
    pub async fn has_access(&self, file_id: &FileId, user_id: &UserId) -> Result<bool> {
        let file_id_owned = file_id.0.clone();
        let user_id_owned = user_id.0.clone();
        let is_owner = self
            .with_conn({
                let file_id = file_id_owned.clone();
                let user_id = user_id_owned.clone();
                move |conn| {
                    conn.query_row(
                        "SELECT 1 FROM files WHERE file_id = ?1 AND owner_id = ?2",
                        params![file_id, user_id],
                        |_| Ok(()),
                    )
                    .optional()
                }
            })
            .await?
            .is_some();

        if is_owner {
            return Ok(true);
        }

        let has_approval = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT 1 FROM permissions \
                     WHERE file_id = ?1 AND user_id = ?2 AND status = 'APPROVED'",
                    params![file_id_owned, user_id_owned],
                    |_| Ok(()),
                )
                .optional()
            })
            .await?
            .is_some();

        Ok(has_approval)
    }

    /// Applies a replicated mutation, the follower-side counterpart of
    /// whichever leader-side method produced it.
    pub async fn apply(&self, op: gfs_core::ReplicatedOp) -> Result<()> {
        use gfs_core::ReplicatedOp::*;
        match op {
            RegisterUser {
                user_id,
                username,
                password_digest,
            } => self.register_user(&user_id, &username, &password_digest).await,
            CreateFile { file } => self.create_file(&file).await,
            CreateChunkMapping { mapping } => self.create_chunk_mapping(&mapping).await,
            RequestAccess {
                request_id,
                file_id,
                user_id,
                access_type,
            } => {
                self.request_access(&PermissionRequest {
                    request_id,
                    file_id,
                    user_id,
                    access_type,
                    status: AccessStatus::Pending,
                })
                .await
            }
            SetAccessStatus { request_id, status } => {
                self.set_access_status(&request_id, status).await
            }
        }
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn encode_replica_set(replica_set: &[gfs_core::Port]) -> String {
    replica_set
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn decode_replica_set(encoded: &str) -> Vec<gfs_core::Port> {
    encoded
        .split(',')
        .filter_map(|p| p.parse().ok())
        .collect()
}

fn row_to_file_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        file_id: FileId(row.get(0)?),
        filename: row.get(1)?,
        size: row.get(2)?,
        owner_id: UserId(row.get(3)?),
    })
}

fn row_to_chunk_mapping(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkMapping> {
    let replica_set: String = row.get(4)?;
    Ok(ChunkMapping {
        chunk_handle: ChunkHandle(row.get(0)?),
        file_id: FileId(row.get(1)?),
        sequence_index: row.get(2)?,
        primary_location: row.get(3)?,
        replica_set: decode_replica_set(&replica_set),
    })
}

fn row_to_permission_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<PermissionRequest> {
    let status: String = row.get(4)?;
    Ok(PermissionRequest {
        request_id: gfs_core::RequestId(row.get(0)?),
        file_id: FileId(row.get(1)?),
        user_id: UserId(row.get(2)?),
        access_type: row.get(3)?,
        status: AccessStatus::parse(&status).unwrap_or(AccessStatus::Pending),
    })
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    username TEXT UNIQUE NOT NULL,
    password_digest TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS files (
    file_id TEXT PRIMARY KEY,
    filename TEXT NOT NULL,
    size INTEGER NOT NULL,
    owner_id TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS chunk_mapping (
    chunk_handle TEXT PRIMARY KEY,
    file_id TEXT NOT NULL,
    sequence_index INTEGER NOT NULL,
    primary_location INTEGER NOT NULL,
    replica_set TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS permissions (
    request_id TEXT PRIMARY KEY,
    file_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    access_type TEXT NOT NULL,
    status TEXT NOT NULL
);
";

#[cfg(test)]
mod tests {
    use super::*;
    use gfs_core::ReplicatedOp;

    #[tokio::test]
    async fn register_and_authenticate_round_trip() {
        let store = MetadataStore::open_in_memory().await.unwrap();
        let user_id = UserId::generate();
        store
            .register_user(&user_id, "alice", "digest123")
            .await
            .unwrap();

        let authenticated = store.authenticate("alice", "digest123").await.unwrap();
        assert_eq!(authenticated, user_id);

        let err = store.authenticate("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, GfsError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let store = MetadataStore::open_in_memory().await.unwrap();
        let user_id_a = UserId::generate();
        let user_id_b = UserId::generate();
        store
            .register_user(&user_id_a, "bob", "digest")
            .await
            .unwrap();

        let err = store
            .register_user(&user_id_b, "bob", "other-digest")
            .await
            .unwrap_err();
        assert!(matches!(err, GfsError::Duplicate(name) if name == "bob"));
    }

    #[tokio::test]
    async fn file_create_lookup_and_list() {
        let store = MetadataStore::open_in_memory().await.unwrap();
        let owner = UserId::generate();
        let file = FileRecord {
            file_id: FileId("file_1".to_string()),
            filename: "report.txt".to_string(),
            size: 42,
            owner_id: owner.clone(),
        };
        store.create_file(&file).await.unwrap();

        let found = store.lookup_file(&file.file_id).await.unwrap().unwrap();
        assert_eq!(found.filename, "report.txt");

        let listed = store.list_files(&owner).await.unwrap();
        assert_eq!(listed.len(), 1);

        let missing = store
            .lookup_file(&FileId("file_missing".to_string()))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn chunk_mapping_round_trips_its_replica_set() {
        let store = MetadataStore::open_in_memory().await.unwrap();
        let mapping = ChunkMapping {
            chunk_handle: ChunkHandle("chunk_file_1_0".to_string()),
            file_id: FileId("file_1".to_string()),
            sequence_index: 0,
            primary_location: 9001,
            replica_set: vec![9001, 9002, 9003],
        };
        store.create_chunk_mapping(&mapping).await.unwrap();

        let found = store
            .chunk_mapping(&mapping.chunk_handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.replica_set, vec![9001, 9002, 9003]);
        assert_eq!(found.primary_location, 9001);
    }

    #[tokio::test]
    async fn access_lifecycle_owner_and_approval() {
        let store = MetadataStore::open_in_memory().await.unwrap();
        let owner = UserId::generate();
        let requester = UserId::generate();
        let file = FileRecord {
            file_id: FileId("file_1".to_string()),
            filename: "secret.txt".to_string(),
            size: 1,
            owner_id: owner.clone(),
        };
        store.create_file(&file).await.unwrap();

        assert!(store.has_access(&file.file_id, &owner).await.unwrap());
        assert!(!store.has_access(&file.file_id, &requester).await.unwrap());

        let request = PermissionRequest {
            request_id: gfs_core::RequestId::generate(),
            file_id: file.file_id.clone(),
            user_id: requester.clone(),
            access_type: "read".to_string(),
            status: AccessStatus::Pending,
        };
        store.request_access(&request).await.unwrap();

        let pending = store.pending_requests_for_owner(&owner).await.unwrap();
        assert_eq!(pending.len(), 1);

        store
            .set_access_status(&request.request_id, AccessStatus::Approved)
            .await
            .unwrap();
        assert!(store.has_access(&file.file_id, &requester).await.unwrap());

        let err = store
            .set_access_status(&gfs_core::RequestId("missing".to_string()), AccessStatus::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, GfsError::NotFound(_)));
    }

    #[tokio::test]
    async fn apply_replicated_op_creates_file() {
        let store = MetadataStore::open_in_memory().await.unwrap();
        let owner = UserId::generate();
        let file = FileRecord {
            file_id: FileId("file_2".to_string()),
            filename: "from-leader.txt".to_string(),
            size: 7,
            owner_id: owner,
        };
        store.apply(ReplicatedOp::CreateFile { file: file.clone() }).await.unwrap();

        let found = store.lookup_file(&file.file_id).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn shared_files_for_lists_only_approved_grants() {
        let store = MetadataStore::open_in_memory().await.unwrap();
        let owner = UserId::generate();
        let viewer = UserId::generate();
        let file = FileRecord {
            file_id: FileId("file_3".to_string()),
            filename: "shared.txt".to_string(),
            size: 0,
            owner_id: owner,
        };
        store.create_file(&file).await.unwrap();

        assert!(store.shared_files_for(&viewer).await.unwrap().is_empty());

        let request = PermissionRequest {
            request_id: gfs_core::RequestId::generate(),
            file_id: file.file_id.clone(),
            user_id: viewer.clone(),
            access_type: "read".to_string(),
            status: AccessStatus::Pending,
        };
        store.request_access(&request).await.unwrap();
        assert!(store.shared_files_for(&viewer).await.unwrap().is_empty());

        store
            .set_access_status(&request.request_id, AccessStatus::Approved)
            .await
            .unwrap();
        let shared = store.shared_files_for(&viewer).await.unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].file_id, file.file_id);
    }
}
