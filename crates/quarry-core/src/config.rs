use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration for indexing and retrieval.
///
/// Resolution is layered with documented precedence (highest wins):
/// environment variables > project config file > built-in defaults.
/// Each layer is a [`ConfigOverlay`] applied in order by [`QuarryConfig::load`];
/// a malformed value in any layer leaves that field at the previous layer's
/// value and never affects the rest of the configuration.
///
/// # Examples
///
/// ```
/// use quarry_core::QuarryConfig;
///
/// let config = QuarryConfig::default();
/// assert_eq!(config.chunk_lines, 120);
/// assert!(config.semantic.enabled);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarryConfig {
    /// Number of lines per chunk (default: 120).
    #[serde(default = "default_chunk_lines")]
    pub chunk_lines: usize,
    /// Directory names skipped entirely during scanning.
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    /// File extensions (leading dot) recognized as text without probing.
    #[serde(default = "default_text_ext")]
    pub text_ext: Vec<String>,
    /// Semantic search (embedding provider) settings.
    #[serde(default)]
    pub semantic: SemanticConfig,
}

/// Embedding provider settings for hybrid search.
///
/// # Examples
///
/// ```
/// use quarry_core::SemanticConfig;
///
/// let config = SemanticConfig::default();
/// assert_eq!(config.model, "nomic-embed-text");
/// assert_eq!(config.batch, 32);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Whether hybrid search is attempted at all (default: true).
    #[serde(default = "default_semantic_enabled")]
    pub enabled: bool,
    /// Base URL of the embedding provider.
    #[serde(default = "default_semantic_url")]
    pub url: String,
    /// Embedding model name; cached vectors are keyed per model.
    #[serde(default = "default_semantic_model")]
    pub model: String,
    /// Per-request timeout in seconds (default: 10.0).
    #[serde(default = "default_semantic_timeout")]
    pub timeout: f64,
    /// Number of chunk texts per embedding request (default: 32).
    #[serde(default = "default_semantic_batch")]
    pub batch: usize,
    /// Weight of the BM25 score in fusion (default: 0.5).
    #[serde(default = "default_weight")]
    pub weight_bm25: f64,
    /// Weight of the cosine similarity in fusion (default: 0.5).
    #[serde(default = "default_weight")]
    pub weight_emb: f64,
}

fn default_chunk_lines() -> usize {
    120
}

fn default_exclude_dirs() -> Vec<String> {
    [
        ".git",
        ".quarry",
        "node_modules",
        ".venv",
        "dist",
        "build",
        ".next",
        ".cache",
        ".pytest_cache",
        ".mypy_cache",
        ".idea",
        ".vscode",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_text_ext() -> Vec<String> {
    [
        ".py", ".ts", ".tsx", ".js", ".jsx", ".mjs", ".c", ".cpp", ".h", ".hpp", ".rs", ".go",
        ".java", ".php", ".rb", ".cs", ".swift", ".kt", ".scala", ".sql", ".md", ".yml", ".yaml",
        ".toml", ".ini", ".cfg", ".txt", ".html", ".css", ".scss",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_semantic_enabled() -> bool {
    true
}

fn default_semantic_url() -> String {
    "http://127.0.0.1:11434".into()
}

fn default_semantic_model() -> String {
    "nomic-embed-text".into()
}

fn default_semantic_timeout() -> f64 {
    10.0
}

fn default_semantic_batch() -> usize {
    32
}

fn default_weight() -> f64 {
    0.5
}

impl Default for QuarryConfig {
    fn default() -> Self {
        Self {
            chunk_lines: default_chunk_lines(),
            exclude_dirs: default_exclude_dirs(),
            text_ext: default_text_ext(),
            semantic: SemanticConfig::default(),
        }
    }
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: default_semantic_enabled(),
            url: default_semantic_url(),
            model: default_semantic_model(),
            timeout: default_semantic_timeout(),
            batch: default_semantic_batch(),
            weight_bm25: default_weight(),
            weight_emb: default_weight(),
        }
    }
}

impl QuarryConfig {
    /// Resolve the effective configuration for a repository root.
    ///
    /// Applies the layers in order: built-in defaults, then the project
    /// config file (first of `.quarry.toml`, `.quarry/config.toml`,
    /// `quarry.toml` that exists under `root`), then environment variables.
    /// This never fails: unreadable or unparsable layers contribute nothing.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use quarry_core::QuarryConfig;
    ///
    /// let config = QuarryConfig::load(Path::new("."));
    /// assert!(config.chunk_lines > 0);
    /// ```
    pub fn load(root: &Path) -> Self {
        let mut config = Self::default();
        if let Some(path) = Self::find_file(root) {
            if let Ok(content) = std::fs::read_to_string(&path) {
                config.apply(&ConfigOverlay::from_toml(&content));
            }
        }
        config.apply(&ConfigOverlay::from_env());
        config
    }

    /// Locate the project config file under `root`, if any.
    ///
    /// Checked in order: `.quarry.toml`, `.quarry/config.toml`, `quarry.toml`.
    pub fn find_file(root: &Path) -> Option<PathBuf> {
        [
            root.join(".quarry.toml"),
            root.join(".quarry").join("config.toml"),
            root.join("quarry.toml"),
        ]
        .into_iter()
        .find(|p| p.exists())
    }

    /// Apply one partial layer on top of the current values.
    ///
    /// Fields the overlay leaves as `None` are untouched.
    pub fn apply(&mut self, overlay: &ConfigOverlay) {
        if let Some(v) = overlay.chunk_lines {
            self.chunk_lines = v;
        }
        if let Some(v) = &overlay.exclude_dirs {
            self.exclude_dirs = v.clone();
        }
        if let Some(v) = &overlay.text_ext {
            self.text_ext = v.clone();
        }
        let s = &overlay.semantic;
        if let Some(v) = s.enabled {
            self.semantic.enabled = v;
        }
        if let Some(v) = &s.url {
            self.semantic.url = v.clone();
        }
        if let Some(v) = &s.model {
            self.semantic.model = v.clone();
        }
        if let Some(v) = s.timeout {
            self.semantic.timeout = v;
        }
        if let Some(v) = s.batch {
            self.semantic.batch = v;
        }
        if let Some(v) = s.weight_bm25 {
            self.semantic.weight_bm25 = v;
        }
        if let Some(v) = s.weight_emb {
            self.semantic.weight_emb = v;
        }
    }
}

/// One partial configuration layer: every field optional.
///
/// Produced from a TOML document or the process environment; `None` means
/// "this layer says nothing about that field" — including when the source
/// carries a value of the wrong type, which is dropped silently per field.
///
/// # Examples
///
/// ```
/// use quarry_core::ConfigOverlay;
///
/// let overlay = ConfigOverlay::from_toml("chunk_lines = 50");
/// assert_eq!(overlay.chunk_lines, Some(50));
/// assert!(overlay.text_ext.is_none());
/// ```
#[derive(Debug, Default)]
pub struct ConfigOverlay {
    pub chunk_lines: Option<usize>,
    pub exclude_dirs: Option<Vec<String>>,
    pub text_ext: Option<Vec<String>>,
    pub semantic: SemanticOverlay,
}

/// Partial layer for the `[semantic]` block.
#[derive(Debug, Default)]
pub struct SemanticOverlay {
    pub enabled: Option<bool>,
    pub url: Option<String>,
    pub model: Option<String>,
    pub timeout: Option<f64>,
    pub batch: Option<usize>,
    pub weight_bm25: Option<f64>,
    pub weight_emb: Option<f64>,
}

impl ConfigOverlay {
    /// Build an overlay from TOML text, field by field.
    ///
    /// An unparsable document yields an empty overlay; a field of the wrong
    /// TOML type is treated as absent. This is what gives malformed values
    /// per-field fallback instead of poisoning the whole file.
    pub fn from_toml(content: &str) -> Self {
        let Ok(value) = content.parse::<toml::Value>() else {
            return Self::default();
        };
        let Some(table) = value.as_table() else {
            return Self::default();
        };

        let semantic = table
            .get("semantic")
            .and_then(|v| v.as_table())
            .map(|t| SemanticOverlay {
                enabled: get_bool(t, "enabled"),
                url: get_string(t, "url"),
                model: get_string(t, "model"),
                timeout: get_f64(t, "timeout"),
                batch: get_usize(t, "batch"),
                weight_bm25: get_f64(t, "weight_bm25"),
                weight_emb: get_f64(t, "weight_emb"),
            })
            .unwrap_or_default();

        Self {
            chunk_lines: get_usize(table, "chunk_lines"),
            exclude_dirs: get_string_list(table, "exclude_dirs"),
            text_ext: get_string_list(table, "text_ext"),
            semantic,
        }
    }

    /// Build an overlay from `QUARRY_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    /// Build an environment overlay from an arbitrary lookup function.
    ///
    /// Split out so tests can exercise the parsing without mutating the
    /// process environment.
    pub fn from_env_with(get: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            chunk_lines: get("QUARRY_CHUNK_LINES").and_then(|v| v.parse().ok()),
            exclude_dirs: None,
            text_ext: None,
            semantic: SemanticOverlay {
                enabled: get("QUARRY_SEMANTIC_ENABLED").map(|v| parse_enabled(&v)),
                url: get("QUARRY_EMBED_URL"),
                model: get("QUARRY_EMBED_MODEL"),
                timeout: get("QUARRY_EMBED_TIMEOUT").and_then(|v| v.parse().ok()),
                batch: get("QUARRY_EMBED_BATCH").and_then(|v| v.parse().ok()),
                weight_bm25: get("QUARRY_W_BM25").and_then(|v| v.parse().ok()),
                weight_emb: get("QUARRY_W_EMB").and_then(|v| v.parse().ok()),
            },
        }
    }
}

fn parse_enabled(value: &str) -> bool {
    !matches!(value.to_lowercase().as_str(), "0" | "false" | "no")
}

fn get_usize(table: &toml::Table, key: &str) -> Option<usize> {
    table
        .get(key)
        .and_then(|v| v.as_integer())
        .and_then(|v| usize::try_from(v).ok())
}

fn get_f64(table: &toml::Table, key: &str) -> Option<f64> {
    let value = table.get(key)?;
    value.as_float().or_else(|| value.as_integer().map(|i| i as f64))
}

fn get_bool(table: &toml::Table, key: &str) -> Option<bool> {
    table.get(key).and_then(|v| v.as_bool())
}

fn get_string(table: &toml::Table, key: &str) -> Option<String> {
    table.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn get_string_list(table: &toml::Table, key: &str) -> Option<Vec<String>> {
    let items = table.get(key)?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|v| v.as_str())
            .map(String::from)
            .collect(),
    )
}
