use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A ranked context fragment returned by search.
///
/// # Examples
///
/// ```
/// use quarry_core::ContextHit;
///
/// let hit = ContextHit {
///     path: "src/db.rs".into(),
///     start_line: 1,
///     end_line: 120,
///     score: 3.2,
///     snippet: "fn connect() { ... }".into(),
/// };
/// assert!(hit.score > 0.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextHit {
    /// Repository-relative path of the owning file.
    pub path: String,
    /// First line of the chunk (1-based, inclusive).
    pub start_line: u32,
    /// Last line of the chunk (1-based, inclusive).
    pub end_line: u32,
    /// Final relevance score (fused, or pure BM25 on fallback).
    pub score: f64,
    /// Chunk text capped to its first 300 lines.
    pub snippet: String,
}

/// Aggregate result of an indexing pass.
///
/// # Examples
///
/// ```
/// use quarry_core::IndexSummary;
///
/// let summary = IndexSummary {
///     added: 12,
///     updated: 3,
///     store_location: ".quarry/index.sqlite".into(),
/// };
/// assert_eq!(summary.added, 12);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    /// Files seen for the first time this pass.
    pub added: usize,
    /// Files whose chunks were rebuilt this pass.
    pub updated: usize,
    /// Filesystem location of the chunk store.
    pub store_location: String,
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use quarry_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
