//! MCP server setup and lifecycle.
//!
//! Provides [`run_server`] which starts the stdio-based MCP server,
//! registering all Quarry tools and blocking until the client disconnects.

use std::path::PathBuf;

use quarry_core::QuarryError;
use rmcp::{model::*, tool_handler, transport::stdio, ServerHandler, ServiceExt};

use crate::tools::QuarryServer;

const SERVER_INSTRUCTIONS: &str = "\
Quarry indexes a local repository and retrieves the most relevant snippets for a question:\n\
- refresh_index: update the chunk index (incremental; run after files change)\n\
- search: top-K relevant snippets via hybrid BM25 + embedding ranking (BM25-only fallback)\n\
- open_file: read a line-bounded slice of one file\n\
- list_files: list repository files matching a glob\n\
- capabilities: show the effective configuration";

#[tool_handler]
impl ServerHandler for QuarryServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "quarry".to_string(),
                title: Some("Quarry Context Retrieval".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: Some(
                    "Local repo indexing and hybrid context retrieval for AI coding assistants"
                        .to_string(),
                ),
                icons: None,
                website_url: None,
            },
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
        }
    }
}

/// Start the MCP server on stdio transport.
///
/// This is called by the `quarry mcp` CLI subcommand. It blocks until
/// the client closes stdin.
///
/// # Errors
///
/// Returns [`QuarryError`] if the server fails to initialize or encounters
/// a transport error.
///
/// # Examples
///
/// ```no_run
/// use std::path::PathBuf;
///
/// # async fn example() -> Result<(), quarry_core::QuarryError> {
/// quarry_mcp::server::run_server(PathBuf::from(".")).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_server(repo_path: PathBuf) -> Result<(), QuarryError> {
    let server = QuarryServer::new(repo_path);
    let service = server
        .serve(stdio())
        .await
        .map_err(|e| QuarryError::Config(format!("MCP server failed to start: {e}")))?;

    service
        .waiting()
        .await
        .map_err(|e| QuarryError::Config(format!("MCP server error: {e}")))?;

    Ok(())
}
