//! Score fusion, graceful degradation, and top-K selection.

use std::path::Path;

use quarry_core::{ContextHit, QuarryConfig, Result, SemanticConfig};
use quarry_index::store::{store_path, ChunkRow, ChunkStore};

use crate::bm25::{tokenize, Bm25Model};
use crate::embedding::EmbeddingClient;

/// Snippets are capped to this many leading lines of the chunk.
pub const SNIPPET_MAX_LINES: usize = 300;

/// Floor applied to vector norms so a zero vector cannot divide by zero.
const NORM_EPSILON: f64 = 1e-9;

/// Answer a natural-language question with the top `k` chunks.
///
/// Ranks every chunk currently in the store: BM25 over the corpus, fused
/// with cosine similarity against the query embedding when semantic search
/// is enabled and every vector can be obtained. Any embedding failure —
/// provider down, timeout, malformed response, missing chunk vector —
/// silently degrades the ranking to lexical-only; vectors embedded before
/// the failure stay cached for the next query.
///
/// Ties are broken by ascending corpus order (lower chunk id wins), so the
/// output is reproducible run to run.
///
/// # Errors
///
/// Returns [`quarry_core::QuarryError::Database`] only if the chunk store
/// itself cannot be opened or read. An empty or missing index yields an
/// empty result, not an error.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use quarry_core::QuarryConfig;
///
/// # async fn example() {
/// let config = QuarryConfig::load(Path::new("."));
/// let hits = quarry_search::search(Path::new("."), "where is auth wired?", 12, &config)
///     .await
///     .unwrap();
/// for hit in hits {
///     println!("{}:{}-{}  {:.3}", hit.path, hit.start_line, hit.end_line, hit.score);
/// }
/// # }
/// ```
pub async fn search(
    root: &Path,
    question: &str,
    k: usize,
    config: &QuarryConfig,
) -> Result<Vec<ContextHit>> {
    let mut store = ChunkStore::open(&store_path(root))?;
    let rows = store.all_chunks()?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let docs: Vec<Vec<String>> = rows.iter().map(|r| tokenize(&r.text)).collect();
    let model = Bm25Model::fit(&docs);
    let lexical = model.scores(&tokenize(question));

    let finals = if config.semantic.enabled {
        match semantic_scores(&mut store, &config.semantic, question, &rows).await {
            Some(cosine) => fuse(
                &lexical,
                &cosine,
                config.semantic.weight_bm25,
                config.semantic.weight_emb,
            ),
            None => lexical,
        }
    } else {
        lexical
    };

    let hits = top_indices(&finals, k)
        .into_iter()
        .map(|i| {
            let row = &rows[i];
            ContextHit {
                path: row.path.clone(),
                start_line: row.start_line,
                end_line: row.end_line,
                score: finals[i],
                snippet: snippet(&row.text),
            }
        })
        .collect();
    Ok(hits)
}

/// Cosine similarity of the query embedding against every chunk, in row
/// order, or `None` when the semantic signal is unavailable.
///
/// Fills the embedding cache for the active model as a side effect: missing
/// chunks are embedded in fixed-size batches and each successful batch is
/// persisted immediately, so progress survives a mid-pass provider failure
/// even though the current query then falls back to lexical-only.
pub async fn semantic_scores(
    store: &mut ChunkStore,
    config: &SemanticConfig,
    question: &str,
    rows: &[ChunkRow],
) -> Option<Vec<f64>> {
    let client = EmbeddingClient::new(config).ok()?;
    let query_vec = client.embed_query(question).await.ok()?;

    let mut cached = store.load_embeddings(&config.model).ok()?;
    let missing: Vec<&ChunkRow> = rows.iter().filter(|r| !cached.contains_key(&r.id)).collect();

    for batch in missing.chunks(config.batch.max(1)) {
        let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
        let vectors = client.embed(&texts).await.ok()?;
        let pairs: Vec<(i64, Vec<f32>)> = batch
            .iter()
            .zip(vectors)
            .map(|(row, vector)| (row.id, vector))
            .collect();
        store.store_embeddings(&config.model, &pairs).ok()?;
        cached.extend(pairs);
    }

    let mut scores = Vec::with_capacity(rows.len());
    for row in rows {
        let vector = cached.get(&row.id)?;
        scores.push(cosine_similarity(&query_vec, vector));
    }
    Some(scores)
}

/// Cosine similarity between two vectors, with zero norms floored.
///
/// # Examples
///
/// ```
/// use quarry_search::hybrid::cosine_similarity;
///
/// assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
/// assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = f64::from(*x);
        let y = f64::from(*y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    dot / (norm_a.sqrt().max(NORM_EPSILON) * norm_b.sqrt().max(NORM_EPSILON))
}

/// Weighted linear fusion of lexical and semantic scores.
pub fn fuse(lexical: &[f64], cosine: &[f64], weight_bm25: f64, weight_emb: f64) -> Vec<f64> {
    lexical
        .iter()
        .zip(cosine.iter())
        .map(|(l, c)| weight_bm25 * l + weight_emb * c)
        .collect()
}

/// Indices of the `k` highest scores, ties broken by ascending index.
///
/// The tie-break is explicit rather than relying on sort stability, so the
/// selection is reproducible regardless of how the scores were produced.
///
/// # Examples
///
/// ```
/// use quarry_search::hybrid::top_indices;
///
/// assert_eq!(top_indices(&[1.0, 3.0, 3.0, 2.0], 3), vec![1, 2, 3]);
/// ```
pub fn top_indices(scores: &[f64], k: usize) -> Vec<usize> {
    let mut idxs: Vec<usize> = (0..scores.len()).collect();
    idxs.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    idxs.truncate(k);
    idxs
}

fn snippet(text: &str) -> String {
    text.lines()
        .take(SNIPPET_MAX_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_norm_does_not_divide_by_zero() {
        let sim = cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]);
        assert!(sim.is_finite());
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn fusion_shifts_ranking_toward_cosine_as_weight_emb_grows() {
        // lexical prefers doc 0, cosine prefers doc 1
        let lexical = [2.0, 1.0];
        let cosine = [0.1, 0.9];

        let mostly_lexical = fuse(&lexical, &cosine, 0.9, 0.1);
        assert!(mostly_lexical[0] > mostly_lexical[1]);

        let mostly_semantic = fuse(&lexical, &cosine, 0.1, 0.9);
        assert!(mostly_semantic[1] > mostly_semantic[0]);

        // at the extreme, ranking equals descending cosine order
        let all_semantic = fuse(&lexical, &cosine, 0.0, 1.0);
        assert_eq!(top_indices(&all_semantic, 2), top_indices(&cosine, 2));
    }

    #[test]
    fn top_indices_takes_highest_first() {
        assert_eq!(top_indices(&[0.5, 2.0, 1.0], 2), vec![1, 2]);
    }

    #[test]
    fn top_indices_breaks_ties_by_corpus_order() {
        let scores = [1.0, 1.0, 1.0, 1.0];
        assert_eq!(top_indices(&scores, 3), vec![0, 1, 2]);
    }

    #[test]
    fn top_indices_handles_k_beyond_len() {
        assert_eq!(top_indices(&[1.0], 10), vec![0]);
        assert!(top_indices(&[], 10).is_empty());
    }

    #[test]
    fn snippet_caps_at_limit() {
        let text: String = (0..400).map(|i| format!("line {i}\n")).collect();
        let s = snippet(&text);
        assert_eq!(s.lines().count(), SNIPPET_MAX_LINES);
    }
}
