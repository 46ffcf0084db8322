//! # Chunk payload store
//!
//! A chunkserver's two-phase write path: `stage` buffers bytes in memory
//! under a handle, `commit` moves them into durable SQLite storage and
//! hands them back to the caller so it can fan them out to secondaries.
//! `commit_replicated` is the secondary-side counterpart, which skips
//! staging entirely since the primary already validated the write.

use gfs_core::{GfsError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::RwLock;

pub struct ChunkStore {
    conn: Arc<StdMutex<Connection>>,
    staged: RwLock<HashMap<String, Vec<u8>>>,
}

impl ChunkStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> rusqlite::Result<Connection> {
            let conn = Connection::open(path)?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS stored_chunks (
                    chunk_handle TEXT PRIMARY KEY,
                    data BLOB NOT NULL,
                    version INTEGER NOT NULL,
                    last_mod_seconds REAL NOT NULL
                );",
            )?;
            Ok(conn)
        })
        .await
        .expect("chunk store open task panicked")?;

        Ok(Self {
            conn: Arc::new(StdMutex::new(conn)),
            staged: RwLock::new(HashMap::new()),
        })
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio::task::spawn_blocking(|| -> rusqlite::Result<Connection> {
            let conn = Connection::open_in_memory()?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS stored_chunks (
                    chunk_handle TEXT PRIMARY KEY,
                    data BLOB NOT NULL,
                    version INTEGER NOT NULL,
                    last_mod_seconds REAL NOT NULL
                );",
            )?;
            Ok(conn)
        })
        .await
        .expect("chunk store open task panicked")?;

        Ok(Self {
            conn: Arc::new(StdMutex::new(conn)),
            staged: RwLock::new(HashMap::new()),
        })
    }

    /// Buffers `data` under `chunk_handle`, overwriting any previous stage
    /// for the same handle. Not durable: a crash before `commit` loses it.
    pub async fn stage(&self, chunk_handle: &str, data: Vec<u8>) {
        self.staged
            .write()
            .await
            .insert(chunk_handle.to_string(), data);
    }

    /// Moves the staged bytes for `chunk_handle` into durable storage,
    /// returning them so the caller can fan the write out to secondaries.
    /// `last_mod_seconds` is the committer's simulated time, matching the
    /// original's `last_mod=get_simulated_time()` column.
    pub async fn commit(&self, chunk_handle: &str, last_mod_seconds: f64) -> Result<Vec<u8>> {
        let data = self
            .staged
            .write()
            .await
            .remove(chunk_handle)
            .ok_or(GfsError::NoStagedData)?;

        self.persist(chunk_handle, data.clone(), last_mod_seconds).await?;
        Ok(data)
    }

    /// Persists `data` directly, without requiring a prior `stage` call.
    /// Used by secondaries committing a write the primary already staged
    /// and validated on its own end.
    pub async fn commit_replicated(
        &self,
        chunk_handle: &str,
        data: Vec<u8>,
        last_mod_seconds: f64,
    ) -> Result<()> {
        self.persist(chunk_handle, data, last_mod_seconds).await
    }

    pub async fn read(&self, chunk_handle: &str) -> Result<Vec<u8>> {
        let handle = chunk_handle.to_string();
        let conn = Arc::clone(&self.conn);
        let data = tokio::task::spawn_blocking(move || -> rusqlite::Result<Option<Vec<u8>>> {
            let guard = conn.lock().expect("chunk store connection mutex poisoned");
            guard
                .query_row(
                    "SELECT data FROM stored_chunks WHERE chunk_handle = ?1",
                    params![handle],
                    |row| row.get::<_, Vec<u8>>(0),
                )
                .optional()
        })
        .await
        .expect("chunk store worker task panicked")?;

        data.ok_or_else(|| GfsError::NotFound(format!("chunk {chunk_handle}")))
    }

    async fn persist(&self, chunk_handle: &str, data: Vec<u8>, last_mod_seconds: f64) -> Result<()> {
        let handle = chunk_handle.to_string();
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            conn.lock()
                .expect("chunk store connection mutex poisoned")
                .execute(
                    "INSERT OR REPLACE INTO stored_chunks (chunk_handle, data, version, last_mod_seconds) \
                     VALUES (?1, ?2, 1, ?3)",
                    params![handle, data, last_mod_seconds],
                )
        })
        .await
        .expect("chunk store worker task panicked")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stage_then_commit_persists_and_returns_data() {
        let store = ChunkStore::open_in_memory().await.unwrap();
        store.stage("chunk_file_1_0", b"hello".to_vec()).await;

        let committed = store.commit("chunk_file_1_0", 100.0).await.unwrap();
        assert_eq!(committed, b"hello");

        let read_back = store.read("chunk_file_1_0").await.unwrap();
        assert_eq!(read_back, b"hello");
    }

    #[tokio::test]
    async fn commit_without_stage_fails() {
        let store = ChunkStore::open_in_memory().await.unwrap();
        let err = store.commit("chunk_file_1_0", 100.0).await.unwrap_err();
        assert!(matches!(err, GfsError::NoStagedData));
    }

    #[tokio::test]
    async fn second_commit_after_success_requires_restaging() {
        let store = ChunkStore::open_in_memory().await.unwrap();
        store.stage("chunk_file_1_0", b"hello".to_vec()).await;
        store.commit("chunk_file_1_0", 100.0).await.unwrap();

        let err = store.commit("chunk_file_1_0", 101.0).await.unwrap_err();
        assert!(matches!(err, GfsError::NoStagedData));
    }

    #[tokio::test]
    async fn commit_replicated_skips_staging() {
        let store = ChunkStore::open_in_memory().await.unwrap();
        store
            .commit_replicated("chunk_file_2_0", b"from-primary".to_vec(), 100.0)
            .await
            .unwrap();

        let read_back = store.read("chunk_file_2_0").await.unwrap();
        assert_eq!(read_back, b"from-primary");
    }

    #[tokio::test]
    async fn reading_unknown_chunk_is_not_found() {
        let store = ChunkStore::open_in_memory().await.unwrap();
        let err = store.read("chunk_missing_0").await.unwrap_err();
        assert!(matches!(err, GfsError::NotFound(_)));
    }
}
