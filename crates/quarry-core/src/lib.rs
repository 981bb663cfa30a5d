//! Core types, configuration, and error handling for the Quarry workspace.
//!
//! This crate provides the shared foundation used by all other Quarry crates:
//! - [`QuarryError`] — unified error type using `thiserror`
//! - [`QuarryConfig`] — layered configuration (environment > file > defaults)
//! - Shared types: [`ContextHit`], [`IndexSummary`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{ConfigOverlay, QuarryConfig, SemanticConfig, SemanticOverlay};
pub use error::QuarryError;
pub use types::{ContextHit, IndexSummary, OutputFormat};

/// A convenience `Result` type for Quarry operations.
pub type Result<T> = std::result::Result<T, QuarryError>;
