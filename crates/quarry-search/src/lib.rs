//! Hybrid retrieval: BM25 lexical scoring fused with embedding similarity.
//!
//! The query path rebuilds BM25 statistics over the current chunk corpus,
//! fills the embedding cache for chunks that miss, and fuses both signals
//! into one deterministic ranking. When the embedding provider is disabled
//! or unavailable the ranking degrades to lexical-only — search never fails
//! because a network dependency did.

pub mod bm25;
pub mod embedding;
pub mod hybrid;

pub use bm25::{tokenize, Bm25Model};
pub use embedding::{EmbedError, EmbeddingClient};
pub use hybrid::{search, SNIPPET_MAX_LINES};
