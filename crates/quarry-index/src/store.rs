//! SQLite-backed chunk store.
//!
//! Three tables: `files` (path, mtime, size), `chunks` (line ranges + text),
//! and `embeddings` (cached vectors keyed by chunk id and model). Replacing a
//! file's chunks cascades to its embedding rows in the same transaction, so
//! orphaned vectors never accumulate. Each operation invocation opens its own
//! connection and drops it on completion; cross-call consistency relies on
//! SQLite's WAL and per-statement atomicity only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use quarry_core::QuarryError;
use rusqlite::{params, Connection};

use crate::chunker::Chunk;

/// Location of the chunk store for a repository root.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use quarry_index::store::store_path;
///
/// let db = store_path(Path::new("/repo"));
/// assert!(db.ends_with(".quarry/index.sqlite"));
/// ```
pub fn store_path(root: &Path) -> PathBuf {
    root.join(".quarry").join("index.sqlite")
}

/// The stored (mtime, size) record for an indexed file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    /// Row id in the `files` table.
    pub id: i64,
    /// Last-modified time in seconds since the epoch.
    pub mtime: f64,
    /// Size in bytes.
    pub size: i64,
}

/// One chunk joined with its owning file's path, in corpus order.
#[derive(Debug, Clone)]
pub struct ChunkRow {
    /// Row id in the `chunks` table (embedding cache key).
    pub id: i64,
    /// Repository-relative path of the owning file.
    pub path: String,
    /// First line (1-based, inclusive).
    pub start_line: u32,
    /// Last line (1-based, inclusive).
    pub end_line: u32,
    /// Raw chunk text.
    pub text: String,
}

/// Row counts for the three tables.
#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    /// Number of indexed files.
    pub total_files: usize,
    /// Number of stored chunks.
    pub total_chunks: usize,
    /// Number of cached embedding vectors (all models).
    pub total_embeddings: usize,
}

/// Handle to the on-disk (or in-memory) chunk store.
///
/// # Examples
///
/// ```
/// use quarry_index::store::ChunkStore;
///
/// let store = ChunkStore::in_memory().unwrap();
/// assert_eq!(store.stats().unwrap().total_chunks, 0);
/// ```
pub struct ChunkStore {
    conn: Connection,
}

impl ChunkStore {
    /// Open or create the store at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Database`] if the database cannot be opened or
    /// the schema cannot be created.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use quarry_index::store::ChunkStore;
    ///
    /// let store = ChunkStore::open(Path::new(".quarry/index.sqlite")).unwrap();
    /// ```
    pub fn open(path: &Path) -> Result<Self, QuarryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                QuarryError::Database(format!("failed to create store directory: {e}"))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| QuarryError::Database(format!("failed to open store: {e}")))?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Database`] if schema creation fails.
    pub fn in_memory() -> Result<Self, QuarryError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            QuarryError::Database(format!("failed to create in-memory store: {e}"))
        })?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), QuarryError> {
        self.conn
            .execute_batch(
                "
                PRAGMA journal_mode=WAL;

                CREATE TABLE IF NOT EXISTS files (
                    id INTEGER PRIMARY KEY,
                    path TEXT UNIQUE NOT NULL,
                    mtime REAL NOT NULL,
                    size INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS chunks (
                    id INTEGER PRIMARY KEY,
                    file_id INTEGER NOT NULL,
                    chunk_idx INTEGER NOT NULL,
                    start_line INTEGER NOT NULL,
                    end_line INTEGER NOT NULL,
                    text TEXT NOT NULL,
                    FOREIGN KEY (file_id) REFERENCES files(id)
                );
                CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file_id);

                CREATE TABLE IF NOT EXISTS embeddings (
                    chunk_id INTEGER NOT NULL,
                    model TEXT NOT NULL,
                    vec TEXT NOT NULL,
                    PRIMARY KEY (chunk_id, model),
                    FOREIGN KEY (chunk_id) REFERENCES chunks(id)
                );
                CREATE INDEX IF NOT EXISTS idx_embeddings_model ON embeddings(model);
                ",
            )
            .map_err(|e| QuarryError::Database(format!("failed to create schema: {e}")))?;

        Ok(())
    }

    /// Get the stored record for a path, if the file has been indexed.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Database`] on query failure.
    pub fn file_record(&self, path: &str) -> Result<Option<FileRecord>, QuarryError> {
        let result = self.conn.query_row(
            "SELECT id, mtime, size FROM files WHERE path = ?1",
            params![path],
            |row| {
                Ok(FileRecord {
                    id: row.get(0)?,
                    mtime: row.get(1)?,
                    size: row.get(2)?,
                })
            },
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(QuarryError::Database(format!(
                "failed to look up file '{path}': {e}"
            ))),
        }
    }

    /// Insert a new file record, returning its id.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Database`] on insert failure (including a
    /// duplicate path).
    pub fn insert_file(&self, path: &str, mtime: f64, size: i64) -> Result<i64, QuarryError> {
        self.conn
            .execute(
                "INSERT INTO files (path, mtime, size) VALUES (?1, ?2, ?3)",
                params![path, mtime, size],
            )
            .map_err(|e| QuarryError::Database(format!("failed to insert file: {e}")))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Update the stored (mtime, size) for an existing file.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Database`] on update failure.
    pub fn update_file(&self, id: i64, mtime: f64, size: i64) -> Result<(), QuarryError> {
        self.conn
            .execute(
                "UPDATE files SET mtime = ?1, size = ?2 WHERE id = ?3",
                params![mtime, size, id],
            )
            .map_err(|e| QuarryError::Database(format!("failed to update file: {e}")))?;
        Ok(())
    }

    /// Atomically replace all chunks of a file with freshly computed ones.
    ///
    /// Old chunk rows and the embedding rows referencing them (for every
    /// model) are deleted in the same transaction as the inserts. Chunk ids
    /// are not stable across a replacement.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Database`] on any statement failure; the
    /// transaction is rolled back.
    ///
    /// # Examples
    ///
    /// ```
    /// use quarry_index::chunker::chunk_text;
    /// use quarry_index::store::ChunkStore;
    ///
    /// let mut store = ChunkStore::in_memory().unwrap();
    /// let file_id = store.insert_file("src/lib.rs", 0.0, 4).unwrap();
    /// store.replace_chunks(file_id, &chunk_text("a\nb\n", 120)).unwrap();
    /// assert_eq!(store.stats().unwrap().total_chunks, 1);
    /// ```
    pub fn replace_chunks(&mut self, file_id: i64, chunks: &[Chunk]) -> Result<(), QuarryError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| QuarryError::Database(format!("failed to begin transaction: {e}")))?;

        tx.execute(
            "DELETE FROM embeddings WHERE chunk_id IN
                 (SELECT id FROM chunks WHERE file_id = ?1)",
            params![file_id],
        )
        .map_err(|e| QuarryError::Database(format!("failed to delete embeddings: {e}")))?;

        tx.execute("DELETE FROM chunks WHERE file_id = ?1", params![file_id])
            .map_err(|e| QuarryError::Database(format!("failed to delete chunks: {e}")))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO chunks (file_id, chunk_idx, start_line, end_line, text)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(|e| QuarryError::Database(format!("failed to prepare insert: {e}")))?;
            for chunk in chunks {
                stmt.execute(params![
                    file_id,
                    chunk.idx,
                    chunk.start_line,
                    chunk.end_line,
                    chunk.text,
                ])
                .map_err(|e| QuarryError::Database(format!("failed to insert chunk: {e}")))?;
            }
        }

        tx.commit()
            .map_err(|e| QuarryError::Database(format!("failed to commit chunks: {e}")))?;
        Ok(())
    }

    /// Fetch every stored chunk joined with its file path, in corpus order.
    ///
    /// Corpus order is ascending chunk id; it is the order used for
    /// deterministic tie-breaking during ranking.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Database`] on query failure.
    pub fn all_chunks(&self) -> Result<Vec<ChunkRow>, QuarryError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT c.id, f.path, c.start_line, c.end_line, c.text
                 FROM chunks c JOIN files f ON f.id = c.file_id
                 ORDER BY c.id",
            )
            .map_err(|e| QuarryError::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(ChunkRow {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    start_line: row.get(2)?,
                    end_line: row.get(3)?,
                    text: row.get(4)?,
                })
            })
            .map_err(|e| QuarryError::Database(format!("failed to query chunks: {e}")))?;

        let mut chunks = Vec::new();
        for row in rows {
            chunks
                .push(row.map_err(|e| QuarryError::Database(format!("failed to read row: {e}")))?);
        }
        Ok(chunks)
    }

    /// Load all cached vectors for one model, keyed by chunk id.
    ///
    /// A row whose stored vector fails to deserialize is skipped: corruption
    /// is a cache miss, and the vector will be re-requested and overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Database`] on query failure.
    pub fn load_embeddings(&self, model: &str) -> Result<HashMap<i64, Vec<f32>>, QuarryError> {
        let mut stmt = self
            .conn
            .prepare("SELECT chunk_id, vec FROM embeddings WHERE model = ?1")
            .map_err(|e| QuarryError::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map(params![model], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| QuarryError::Database(format!("failed to query embeddings: {e}")))?;

        let mut cached = HashMap::new();
        for row in rows {
            let (chunk_id, vec_json) =
                row.map_err(|e| QuarryError::Database(format!("failed to read row: {e}")))?;
            if let Ok(vec) = serde_json::from_str::<Vec<f32>>(&vec_json) {
                cached.insert(chunk_id, vec);
            }
        }
        Ok(cached)
    }

    /// Persist vectors for one model, overwriting any prior value per chunk.
    ///
    /// Writes are keyed by (chunk id, model) and idempotent, so callers may
    /// persist batch-by-batch; partial progress survives a later failure.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Database`] on any statement failure.
    pub fn store_embeddings(
        &mut self,
        model: &str,
        pairs: &[(i64, Vec<f32>)],
    ) -> Result<(), QuarryError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| QuarryError::Database(format!("failed to begin transaction: {e}")))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO embeddings (chunk_id, model, vec)
                     VALUES (?1, ?2, ?3)",
                )
                .map_err(|e| QuarryError::Database(format!("failed to prepare insert: {e}")))?;
            for (chunk_id, vec) in pairs {
                let vec_json = serde_json::to_string(vec)?;
                stmt.execute(params![chunk_id, model, vec_json])
                    .map_err(|e| QuarryError::Database(format!("failed to insert vector: {e}")))?;
            }
        }
        tx.commit()
            .map_err(|e| QuarryError::Database(format!("failed to commit vectors: {e}")))?;
        Ok(())
    }

    /// Row counts across the three tables.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Database`] on query failure.
    pub fn stats(&self) -> Result<StoreStats, QuarryError> {
        let count = |sql: &str| -> Result<usize, QuarryError> {
            let n: i64 = self
                .conn
                .query_row(sql, [], |row| row.get(0))
                .map_err(|e| QuarryError::Database(format!("failed to count rows: {e}")))?;
            Ok(n as usize)
        };
        Ok(StoreStats {
            total_files: count("SELECT COUNT(*) FROM files")?,
            total_chunks: count("SELECT COUNT(*) FROM chunks")?,
            total_embeddings: count("SELECT COUNT(*) FROM embeddings")?,
        })
    }
}
