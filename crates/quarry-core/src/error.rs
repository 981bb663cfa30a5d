/// Errors that can occur across the Quarry workspace.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate converts to `miette` diagnostics at the boundary.
///
/// # Examples
///
/// ```
/// use quarry_core::QuarryError;
///
/// let err = QuarryError::Config("unknown option".into());
/// assert!(err.to_string().contains("unknown option"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum QuarryError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Index store (SQLite) failure.
    #[error("index store error: {0}")]
    Database(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
