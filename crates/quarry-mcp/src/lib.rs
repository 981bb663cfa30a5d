//! MCP server interface exposing Quarry tools to IDEs and agents.
//!
//! Implements a Model Context Protocol server using rmcp that exposes
//! `refresh_index`, `search`, `open_file`, `list_files`, and `capabilities`
//! tools over stdio transport for integration with AI coding assistants.
//!
//! # Examples
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), quarry_core::QuarryError> {
//! quarry_mcp::server::run_server(PathBuf::from(".")).await?;
//! # Ok(())
//! # }
//! ```

pub mod server;
pub mod tools;
