//! Tool implementations for the Quarry MCP server.
//!
//! Five tools are exposed: `refresh_index`, `search`, `open_file`,
//! `list_files`, and `capabilities`. Each delegates to the appropriate
//! Quarry crate and returns JSON via `CallToolResult`.

use std::path::PathBuf;

use quarry_core::{ContextHit, QuarryConfig};
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars, tool, tool_router, ErrorData as McpError,
};
use serde::{Deserialize, Serialize};

/// Default result count for the `search` tool.
const DEFAULT_K: usize = 12;

/// Default line window for the `open_file` tool.
const DEFAULT_OPEN_END: u32 = 300;

/// Cap on paths returned by `list_files`.
const LIST_FILES_CAP: usize = 5000;

/// MCP server exposing Quarry indexing and retrieval tools.
///
/// # Examples
///
/// ```
/// use quarry_mcp::tools::QuarryServer;
/// use std::path::PathBuf;
///
/// let server = QuarryServer::new(PathBuf::from("."));
/// ```
#[derive(Clone)]
pub struct QuarryServer {
    pub(crate) repo_path: PathBuf,
    pub(crate) tool_router: ToolRouter<Self>,
}

// --- Parameter structs ---

/// Parameters for the `refresh_index` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RefreshIndexParams {
    /// Repository root (default: server's configured path).
    pub root: Option<String>,
}

/// Parameters for the `search` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchParams {
    /// Natural-language question.
    pub question: String,
    /// Maximum results (default: 12).
    pub k: Option<usize>,
    /// Repository root (default: server's configured path).
    pub root: Option<String>,
}

/// Parameters for the `open_file` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct OpenFileParams {
    /// File path, absolute or relative to the repository root.
    pub path: String,
    /// First line to return, 1-based inclusive (default: 1).
    pub start: Option<u32>,
    /// Last line to return, 1-based inclusive (default: 300).
    pub end: Option<u32>,
}

/// Parameters for the `list_files` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListFilesParams {
    /// Glob pattern relative to the repository root (default: `**/*`).
    pub glob: Option<String>,
}

/// Parameters for the `capabilities` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CapabilitiesParams {
    /// Repository root (default: server's configured path).
    pub root: Option<String>,
}

// --- Response structs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    question: String,
    k: usize,
    results: Vec<ContextHit>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OpenFileResponse {
    path: String,
    start_line: u32,
    end_line: u32,
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListFilesResponse {
    count: usize,
    files: Vec<String>,
}

fn mcp_err(msg: impl Into<String>) -> McpError {
    McpError::internal_error(msg.into(), None)
}

fn json_result(value: &impl Serialize) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| mcp_err(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[tool_router]
impl QuarryServer {
    /// Create a new server rooted at the given repository path.
    pub fn new(repo_path: PathBuf) -> Self {
        Self {
            repo_path,
            tool_router: Self::tool_router(),
        }
    }

    fn resolve_path(&self, path: &Option<String>) -> Result<PathBuf, McpError> {
        let canonical_repo_path = self.repo_path.canonicalize().map_err(|e| {
            mcp_err(format!(
                "Failed to access configured repository path {}: {e}",
                self.repo_path.display()
            ))
        })?;

        let requested_path = match path {
            Some(p) => {
                let input_path = PathBuf::from(p);
                if input_path.is_absolute() {
                    input_path
                } else {
                    canonical_repo_path.join(input_path)
                }
            }
            None => canonical_repo_path.clone(),
        };

        let canonical_requested_path = requested_path.canonicalize().map_err(|e| {
            mcp_err(format!(
                "Failed to resolve path {}: {e}",
                requested_path.display()
            ))
        })?;

        if !canonical_requested_path.starts_with(&canonical_repo_path) {
            return Err(mcp_err(format!(
                "Path {} is outside the configured repository {}",
                canonical_requested_path.display(),
                canonical_repo_path.display()
            )));
        }

        Ok(canonical_requested_path)
    }

    #[tool(
        name = "refresh_index",
        description = "Rebuild or incrementally update the local chunk index for the repository. Only new and changed files are re-read; unchanged files are skipped. Run this before searching a repository that may have changed."
    )]
    pub async fn refresh_index(
        &self,
        Parameters(params): Parameters<RefreshIndexParams>,
    ) -> Result<CallToolResult, McpError> {
        let root = self.resolve_path(&params.root)?;
        let config = QuarryConfig::load(&root);

        // The indexing pass is blocking (filesystem + SQLite): keep it off
        // the async executor.
        let summary = tokio::task::spawn_blocking(move || {
            quarry_index::indexer::refresh_index(&root, &config)
        })
        .await
        .map_err(|e| mcp_err(format!("Indexing task failed: {e}")))?
        .map_err(|e| mcp_err(format!("Indexing failed: {e}")))?;

        json_result(&summary)
    }

    #[tool(
        name = "search",
        description = "Return the top-K most relevant code/text snippets for a natural-language question. Uses hybrid BM25 + embedding ranking when the embedding provider is reachable, and falls back to pure BM25 otherwise. Requires the repository to have been indexed with refresh_index."
    )]
    pub async fn search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let root = self.resolve_path(&params.root)?;
        let config = QuarryConfig::load(&root);
        let k = params.k.unwrap_or(DEFAULT_K);

        let results = quarry_search::search(&root, &params.question, k, &config)
            .await
            .map_err(|e| mcp_err(format!("Search failed: {e}")))?;

        json_result(&SearchResponse {
            question: params.question,
            k,
            results,
        })
    }

    #[tool(
        name = "open_file",
        description = "Open a file inside the repository and return a line-bounded slice (1-based, inclusive). Use this to read the full surroundings of a search hit."
    )]
    pub fn open_file(
        &self,
        Parameters(params): Parameters<OpenFileParams>,
    ) -> Result<CallToolResult, McpError> {
        let path = self.resolve_path(&Some(params.path))?;
        let bytes = std::fs::read(&path)
            .map_err(|e| mcp_err(format!("Failed to read {}: {e}", path.display())))?;
        let content = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = content.lines().collect();

        let start = params.start.unwrap_or(1).max(1);
        let end = params.end.unwrap_or(DEFAULT_OPEN_END).min(lines.len() as u32);
        let text = if start > end {
            String::new()
        } else {
            lines[(start as usize - 1)..(end as usize)].join("\n")
        };

        json_result(&OpenFileResponse {
            path: path.display().to_string(),
            start_line: start,
            end_line: end,
            text,
        })
    }

    #[tool(
        name = "list_files",
        description = "List files under the repository matching a glob pattern (default: all files). Returns at most 5000 paths."
    )]
    pub fn list_files(
        &self,
        Parameters(params): Parameters<ListFilesParams>,
    ) -> Result<CallToolResult, McpError> {
        let root = self.resolve_path(&None)?;
        let pattern = params.glob.unwrap_or_else(|| "**/*".to_string());
        let full_pattern = root.join(&pattern);

        let paths = glob::glob(&full_pattern.to_string_lossy())
            .map_err(|e| mcp_err(format!("Invalid glob pattern '{pattern}': {e}")))?;

        let mut files: Vec<String> = paths
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .map(|p| {
                p.strip_prefix(&root)
                    .unwrap_or(&p)
                    .to_string_lossy()
                    .to_string()
            })
            .collect();
        files.sort();

        let count = files.len();
        files.truncate(LIST_FILES_CAP);
        json_result(&ListFilesResponse { count, files })
    }

    #[tool(
        name = "capabilities",
        description = "Return the effective Quarry configuration for the repository: chunking, scanning, and semantic-search settings after applying config file and environment overrides."
    )]
    pub fn capabilities(
        &self,
        Parameters(params): Parameters<CapabilitiesParams>,
    ) -> Result<CallToolResult, McpError> {
        let root = self.resolve_path(&params.root)?;
        let config = QuarryConfig::load(&root);
        json_result(&config)
    }
}
