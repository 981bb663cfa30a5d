//! File scanning, chunking, and the persistent chunk store.
//!
//! This crate owns the indexing half of Quarry: walking a source tree,
//! deciding which files are indexable text, splitting them into fixed-size
//! line chunks, and keeping the SQLite-backed chunk store in sync with the
//! tree via (mtime, size) change detection.

pub mod chunker;
pub mod indexer;
pub mod scanner;
pub mod store;

pub use chunker::{chunk_text, Chunk};
pub use indexer::{refresh_index, FileChange};
pub use scanner::Scanner;
pub use store::{store_path, ChunkRow, ChunkStore, FileRecord, StoreStats};
