//! Incremental indexing pass: scan, detect changes, rechunk, persist.

use std::path::Path;
use std::time::UNIX_EPOCH;

use quarry_core::{IndexSummary, QuarryConfig, Result};

use crate::chunker::chunk_text;
use crate::scanner::Scanner;
use crate::store::{store_path, ChunkStore, FileRecord};

/// Modification-time slack below which a file counts as unchanged.
///
/// Filesystems and archive round-trips commonly truncate mtimes to whole
/// seconds, so sub-second drift with an identical size is not a change.
pub const MTIME_TOLERANCE_SECS: f64 = 1.0;

/// Outcome of comparing a candidate file against its stored record.
///
/// # Examples
///
/// ```
/// use quarry_index::indexer::FileChange;
///
/// assert_eq!(FileChange::classify(None, 100.0, 10), FileChange::New);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    /// No stored record: first time this path is seen.
    New,
    /// Stored record matches within tolerance: skip without reading.
    Unchanged,
    /// Size differs, or mtime drifted by at least one second.
    Updated,
}

impl FileChange {
    /// Classify a file by comparing its current (mtime, size) to the stored
    /// record. A size change always reindexes regardless of mtime.
    ///
    /// # Examples
    ///
    /// ```
    /// use quarry_index::indexer::FileChange;
    /// use quarry_index::store::FileRecord;
    ///
    /// let rec = FileRecord { id: 1, mtime: 100.0, size: 10 };
    /// assert_eq!(FileChange::classify(Some(&rec), 100.4, 10), FileChange::Unchanged);
    /// assert_eq!(FileChange::classify(Some(&rec), 100.4, 11), FileChange::Updated);
    /// assert_eq!(FileChange::classify(Some(&rec), 102.0, 10), FileChange::Updated);
    /// ```
    pub fn classify(prev: Option<&FileRecord>, mtime: f64, size: i64) -> Self {
        match prev {
            None => FileChange::New,
            Some(rec) if (rec.mtime - mtime).abs() < MTIME_TOLERANCE_SECS && rec.size == size => {
                FileChange::Unchanged
            }
            Some(_) => FileChange::Updated,
        }
    }
}

/// Run one incremental indexing pass over the tree at `root`.
///
/// New files are chunked and inserted; files whose (mtime, size) drifted are
/// rechunked from scratch (their old chunks and cached vectors are dropped);
/// unchanged files are skipped without being read. Unreadable files are
/// skipped with no effect on the index.
///
/// # Errors
///
/// Returns [`quarry_core::QuarryError::Database`] if the store cannot be
/// opened or written. Per-file read failures are not errors.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use quarry_core::QuarryConfig;
/// use quarry_index::indexer::refresh_index;
///
/// let config = QuarryConfig::load(Path::new("."));
/// let summary = refresh_index(Path::new("."), &config).unwrap();
/// println!("{} added, {} updated", summary.added, summary.updated);
/// ```
pub fn refresh_index(root: &Path, config: &QuarryConfig) -> Result<IndexSummary> {
    let dbfile = store_path(root);
    let mut store = ChunkStore::open(&dbfile)?;
    let scanner = Scanner::from_config(config);

    let mut added = 0usize;
    let mut updated = 0usize;

    for path in scanner.files(root) {
        let Ok(meta) = std::fs::metadata(&path) else {
            continue;
        };
        let Some(mtime) = mtime_secs(&meta) else {
            continue;
        };
        let size = meta.len() as i64;
        let rel = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .to_string();

        let prev = store.file_record(&rel)?;
        if FileChange::classify(prev.as_ref(), mtime, size) == FileChange::Unchanged {
            continue;
        }

        // Read before touching the store: a vanished or unreadable file must
        // leave the index exactly as it was.
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        let content = String::from_utf8_lossy(&bytes);
        let chunks = chunk_text(&content, config.chunk_lines);

        match prev {
            Some(record) => {
                store.update_file(record.id, mtime, size)?;
                store.replace_chunks(record.id, &chunks)?;
                updated += 1;
            }
            None => {
                let file_id = store.insert_file(&rel, mtime, size)?;
                store.replace_chunks(file_id, &chunks)?;
                added += 1;
            }
        }
    }

    Ok(IndexSummary {
        added,
        updated,
        store_location: dbfile.display().to_string(),
    })
}

fn mtime_secs(meta: &std::fs::Metadata) -> Option<f64> {
    meta.modified()
        .ok()?
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn record(mtime: f64, size: i64) -> FileRecord {
        FileRecord { id: 1, mtime, size }
    }

    #[test]
    fn classify_new_when_no_record() {
        assert_eq!(FileChange::classify(None, 50.0, 5), FileChange::New);
    }

    #[test]
    fn classify_tolerates_subsecond_mtime_drift() {
        let rec = record(100.0, 10);
        assert_eq!(
            FileChange::classify(Some(&rec), 100.999, 10),
            FileChange::Unchanged
        );
        assert_eq!(
            FileChange::classify(Some(&rec), 99.001, 10),
            FileChange::Unchanged
        );
        assert_eq!(
            FileChange::classify(Some(&rec), 101.0, 10),
            FileChange::Updated
        );
    }

    #[test]
    fn classify_size_change_always_wins() {
        let rec = record(100.0, 10);
        // identical mtime, different size: still an update
        assert_eq!(
            FileChange::classify(Some(&rec), 100.0, 11),
            FileChange::Updated
        );
    }

    #[test]
    fn refresh_counts_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/a.rs"), "fn a() {}\n").unwrap();
        fs::write(root.join("src/b.rs"), "fn b() {}\n").unwrap();

        let config = QuarryConfig::default();
        let summary = refresh_index(root, &config).unwrap();
        assert_eq!(summary.added, 2);
        assert_eq!(summary.updated, 0);
        assert!(summary.store_location.contains(".quarry"));
    }

    #[test]
    fn refresh_is_idempotent_without_changes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.rs"), "fn a() {}\n").unwrap();

        let config = QuarryConfig::default();
        refresh_index(root, &config).unwrap();
        let second = refresh_index(root, &config).unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.updated, 0);
    }

    #[test]
    fn refresh_reindexes_on_size_change() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.rs"), "fn a() {}\n").unwrap();

        let config = QuarryConfig::default();
        refresh_index(root, &config).unwrap();

        fs::write(root.join("a.rs"), "fn a() {}\nfn b() {}\n").unwrap();
        let summary = refresh_index(root, &config).unwrap();
        assert_eq!(summary.added, 0);
        assert_eq!(summary.updated, 1);

        let store = ChunkStore::open(&store_path(root)).unwrap();
        let rows = store.all_chunks().unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].text.contains("fn b()"));
    }

    #[test]
    fn refresh_rebuilds_chunks_with_configured_size() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let content: String = (1..=10).map(|i| format!("line {i}\n")).collect();
        fs::write(root.join("a.md"), &content).unwrap();

        let config = QuarryConfig {
            chunk_lines: 5,
            ..QuarryConfig::default()
        };
        refresh_index(root, &config).unwrap();

        let store = ChunkStore::open(&store_path(root)).unwrap();
        let rows = store.all_chunks().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].start_line, rows[0].end_line), (1, 5));
        assert_eq!((rows[1].start_line, rows[1].end_line), (6, 10));
    }
}
