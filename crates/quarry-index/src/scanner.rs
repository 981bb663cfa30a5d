//! Change-aware file discovery.
//!
//! Walks the tree depth-first, prunes excluded directories without recursing
//! into them, and keeps files that either carry a recognized text extension
//! or whose leading bytes decode as UTF-8.

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use quarry_core::QuarryConfig;

/// Number of leading bytes probed for UTF-8 validity.
const TEXT_PROBE_BYTES: u64 = 2048;

/// Filters a directory walk down to indexable text files.
///
/// # Examples
///
/// ```
/// use quarry_core::QuarryConfig;
/// use quarry_index::scanner::Scanner;
///
/// let scanner = Scanner::from_config(&QuarryConfig::default());
/// ```
pub struct Scanner {
    exclude_dirs: HashSet<String>,
    text_ext: HashSet<String>,
}

impl Scanner {
    /// Build a scanner from the exclusion and extension sets in `config`.
    ///
    /// Extensions are matched case-insensitively in their leading-dot form.
    pub fn from_config(config: &QuarryConfig) -> Self {
        Self {
            exclude_dirs: config.exclude_dirs.iter().cloned().collect(),
            text_ext: config.text_ext.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    /// Lazily yield candidate file paths under `root`, depth-first.
    ///
    /// A directory whose name is in the exclusion set is skipped entirely.
    /// No ordering is guaranteed beyond directories-before-contents; callers
    /// must not rely on a specific traversal order.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use quarry_core::QuarryConfig;
    /// use quarry_index::scanner::Scanner;
    ///
    /// let scanner = Scanner::from_config(&QuarryConfig::default());
    /// for path in scanner.files(Path::new(".")) {
    ///     println!("{}", path.display());
    /// }
    /// ```
    pub fn files<'a>(&'a self, root: &Path) -> impl Iterator<Item = PathBuf> + 'a {
        let exclude = self.exclude_dirs.clone();
        ignore::WalkBuilder::new(root)
            .standard_filters(false)
            .filter_entry(move |entry| {
                if entry.file_type().is_some_and(|t| t.is_dir()) {
                    !exclude.contains(entry.file_name().to_string_lossy().as_ref())
                } else {
                    true
                }
            })
            .build()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
            .map(ignore::DirEntry::into_path)
            .filter(|p| self.is_candidate(p))
    }

    /// Whether a single file is indexable text.
    ///
    /// Recognized extension wins without touching the file; otherwise the
    /// first 2 KiB must decode as valid UTF-8. Unreadable files are not
    /// candidates.
    pub fn is_candidate(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if self.text_ext.contains(&format!(".{}", ext.to_lowercase())) {
                return true;
            }
        }
        probe_is_text(path)
    }
}

fn probe_is_text(path: &Path) -> bool {
    let Ok(file) = std::fs::File::open(path) else {
        return false;
    };
    let mut buf = Vec::with_capacity(TEXT_PROBE_BYTES as usize);
    if file.take(TEXT_PROBE_BYTES).read_to_end(&mut buf).is_err() {
        return false;
    }
    std::str::from_utf8(&buf).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scanner() -> Scanner {
        Scanner::from_config(&QuarryConfig::default())
    }

    fn collect(root: &Path) -> Vec<PathBuf> {
        let s = scanner();
        let mut paths: Vec<PathBuf> = s
            .files(root)
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        paths.sort();
        paths
    }

    #[test]
    fn finds_files_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(root.join("notes.md"), "# notes").unwrap();

        let paths = collect(root);
        assert!(paths.contains(&PathBuf::from("src/main.rs")));
        assert!(paths.contains(&PathBuf::from("notes.md")));
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("README.MD"), "# readme").unwrap();

        let paths = collect(root);
        assert!(paths.contains(&PathBuf::from("README.MD")));
    }

    #[test]
    fn excluded_directory_is_not_recursed_into() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("node_modules/pkg/deep")).unwrap();
        fs::write(root.join("node_modules/pkg/deep/index.js"), "x").unwrap();
        fs::write(root.join("app.js"), "y").unwrap();

        let paths = collect(root);
        assert_eq!(paths, vec![PathBuf::from("app.js")]);
    }

    #[test]
    fn extensionless_utf8_file_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("Makefile"), "all:\n\techo hi\n").unwrap();

        let paths = collect(root);
        assert!(paths.contains(&PathBuf::from("Makefile")));
    }

    #[test]
    fn binary_file_is_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("blob"), [0u8, 159, 146, 150, 255]).unwrap();
        fs::write(root.join("blob.bin"), [0u8, 1, 2, 255]).unwrap();

        let paths = collect(root);
        assert!(paths.is_empty());
    }

    #[test]
    fn recognized_extension_skips_the_probe() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        // invalid UTF-8 but a recognized extension: still a candidate
        fs::write(root.join("data.txt"), [0xFFu8, 0xFE, 0x00]).unwrap();

        let paths = collect(root);
        assert!(paths.contains(&PathBuf::from("data.txt")));
    }
}
