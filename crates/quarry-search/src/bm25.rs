//! BM25 lexical relevance over the chunk corpus.
//!
//! Statistics (term frequencies, document frequencies, average length) are
//! rebuilt from scratch on every query; there is no persisted inverted
//! index. That keeps indexing writes trivial and is fast enough for the
//! small-to-medium corpora this tool targets.

use std::collections::HashMap;

const BM25_K1: f64 = 1.5;
const BM25_B: f64 = 0.75;

/// Lower-case a text and split it into identifier-like tokens.
///
/// A token is a maximal run matching `[a-z_][a-z0-9_]+`: it starts with an
/// ASCII letter or underscore, continues with letters, digits, or
/// underscores, and is at least two characters long. Everything else —
/// punctuation, whitespace, single characters — is discarded.
///
/// # Examples
///
/// ```
/// use quarry_search::bm25::tokenize;
///
/// let tokens = tokenize("fn read_chunk(id: u64) -> Chunk");
/// assert_eq!(tokens, vec!["fn", "read_chunk", "id", "u64", "chunk"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        let ch = ch.to_ascii_lowercase();
        if current.is_empty() {
            if ch.is_ascii_alphabetic() || ch == '_' {
                current.push(ch);
            }
        } else if ch.is_ascii_alphanumeric() || ch == '_' {
            current.push(ch);
        } else {
            if current.len() >= 2 {
                tokens.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.len() >= 2 {
        tokens.push(current);
    }

    tokens
}

/// BM25 statistics fitted over one corpus of tokenized documents.
///
/// # Examples
///
/// ```
/// use quarry_search::bm25::{tokenize, Bm25Model};
///
/// let docs = vec![tokenize("open the socket"), tokenize("close the file")];
/// let model = Bm25Model::fit(&docs);
/// let scores = model.scores(&tokenize("socket"));
/// assert!(scores[0] > scores[1]);
/// ```
pub struct Bm25Model {
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<usize>,
    doc_freqs: HashMap<String, usize>,
    avg_doc_len: f64,
}

impl Bm25Model {
    /// Fit term and document frequencies over `docs`.
    pub fn fit(docs: &[Vec<String>]) -> Self {
        let mut term_freqs = Vec::with_capacity(docs.len());
        let mut doc_lens = Vec::with_capacity(docs.len());
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();

        for doc in docs {
            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in doc {
                *tf.entry(token.clone()).or_default() += 1;
            }
            for term in tf.keys() {
                *doc_freqs.entry(term.clone()).or_default() += 1;
            }
            doc_lens.push(doc.len());
            term_freqs.push(tf);
        }

        let avg_doc_len = if docs.is_empty() {
            0.0
        } else {
            doc_lens.iter().sum::<usize>() as f64 / docs.len() as f64
        };

        Self {
            term_freqs,
            doc_lens,
            doc_freqs,
            avg_doc_len,
        }
    }

    /// Score every document against `query` tokens.
    ///
    /// Uses `idf = ln(1 + (N - df + 0.5)/(df + 0.5))`, which is never
    /// negative, so scores are ≥ 0 and a document sharing no token with the
    /// query scores exactly 0.
    pub fn scores(&self, query: &[String]) -> Vec<f64> {
        let n = self.term_freqs.len();
        let mut scores = vec![0.0; n];
        if n == 0 || query.is_empty() {
            return scores;
        }

        for (i, tf_map) in self.term_freqs.iter().enumerate() {
            let len_ratio = self.doc_lens[i] as f64 / self.avg_doc_len.max(1.0);
            let len_norm = 1.0 - BM25_B + BM25_B * len_ratio;
            for term in query {
                let Some(&tf) = tf_map.get(term) else {
                    continue;
                };
                let df = *self.doc_freqs.get(term).unwrap_or(&0) as f64;
                let idf = ((n as f64 - df + 0.5) / (df + 0.5)).ln_1p();
                let tf = f64::from(tf);
                scores[i] += idf * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * len_norm);
            }
        }

        scores
    }
}
