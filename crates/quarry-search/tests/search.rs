use std::fs;

use quarry_core::QuarryConfig;
use quarry_index::indexer::refresh_index;
use quarry_index::store::{store_path, ChunkStore};
use quarry_search::bm25::{tokenize, Bm25Model};

fn ten_line_file() -> String {
    let mut lines = Vec::new();
    for i in 1..=10 {
        if i == 7 || i == 8 {
            lines.push(format!("line {i} mentions zephyr handling"));
        } else {
            lines.push(format!("line {i} ordinary filler content"));
        }
    }
    lines.join("\n") + "\n"
}

fn lexical_only_config(chunk_lines: usize) -> QuarryConfig {
    let mut config = QuarryConfig {
        chunk_lines,
        ..QuarryConfig::default()
    };
    config.semantic.enabled = false;
    config
}

#[tokio::test]
async fn end_to_end_two_chunk_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("notes.md"), ten_line_file()).unwrap();

    let config = lexical_only_config(5);
    let summary = refresh_index(root, &config).unwrap();
    assert_eq!(summary.added, 1);

    let hits = quarry_search::search(root, "zephyr", 12, &config)
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);

    // the chunk covering lines 6-10 holds the query token and ranks first
    assert_eq!((hits[0].start_line, hits[0].end_line), (6, 10));
    assert!(hits[0].score > 0.0);
    assert_eq!((hits[1].start_line, hits[1].end_line), (1, 5));
    assert_eq!(hits[1].score, 0.0);
    assert!(hits[0].snippet.contains("zephyr"));
}

#[tokio::test]
async fn lexical_only_score_equals_bm25_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("notes.md"), ten_line_file()).unwrap();

    let config = lexical_only_config(5);
    refresh_index(root, &config).unwrap();

    let hits = quarry_search::search(root, "zephyr", 1, &config)
        .await
        .unwrap();

    // recompute BM25 over the stored corpus: the top score must match exactly
    let store = ChunkStore::open(&store_path(root)).unwrap();
    let rows = store.all_chunks().unwrap();
    let docs: Vec<Vec<String>> = rows.iter().map(|r| tokenize(&r.text)).collect();
    let scores = Bm25Model::fit(&docs).scores(&tokenize("zephyr"));
    let best = scores.iter().cloned().fold(f64::MIN, f64::max);

    assert_eq!(hits[0].score, best);
}

#[tokio::test]
async fn unreachable_provider_falls_back_to_lexical() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("notes.md"), ten_line_file()).unwrap();
    fs::write(root.join("other.md"), "a zephyr appears here too\n").unwrap();

    let lexical = lexical_only_config(5);
    refresh_index(root, &lexical).unwrap();

    let mut hybrid = lexical_only_config(5);
    hybrid.semantic.enabled = true;
    hybrid.semantic.url = "http://127.0.0.1:9".into();
    hybrid.semantic.timeout = 0.5;

    let expected = quarry_search::search(root, "zephyr", 12, &lexical)
        .await
        .unwrap();
    let actual = quarry_search::search(root, "zephyr", 12, &hybrid)
        .await
        .unwrap();

    assert!(!actual.is_empty());
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert_eq!(a.path, e.path);
        assert_eq!((a.start_line, a.end_line), (e.start_line, e.end_line));
        assert_eq!(a.score, e.score);
    }
}

#[tokio::test]
async fn missing_index_yields_empty_results() {
    let dir = tempfile::tempdir().unwrap();
    let config = lexical_only_config(120);

    let hits = quarry_search::search(dir.path(), "anything", 5, &config)
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn k_limits_the_result_count() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("notes.md"), ten_line_file()).unwrap();

    let config = lexical_only_config(2);
    refresh_index(root, &config).unwrap();

    let hits = quarry_search::search(root, "zephyr filler", 3, &config)
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
}

#[tokio::test]
async fn search_results_are_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    // two files with identical content produce tied scores
    fs::write(root.join("a.md"), "zephyr\nzephyr\n").unwrap();
    fs::write(root.join("b.md"), "zephyr\nzephyr\n").unwrap();

    let config = lexical_only_config(120);
    refresh_index(root, &config).unwrap();

    let first = quarry_search::search(root, "zephyr", 2, &config)
        .await
        .unwrap();
    let second = quarry_search::search(root, "zephyr", 2, &config)
        .await
        .unwrap();

    let order =
        |hits: &[quarry_core::ContextHit]| hits.iter().map(|h| h.path.clone()).collect::<Vec<_>>();
    assert_eq!(order(&first), order(&second));
}

#[tokio::test]
async fn reindex_then_search_sees_new_content() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("doc.md"), "nothing of note\n").unwrap();

    let config = lexical_only_config(120);
    refresh_index(root, &config).unwrap();
    assert!(quarry_search::search(root, "zephyr", 5, &config)
        .await
        .unwrap()
        .iter()
        .all(|h| h.score == 0.0));

    fs::write(
        root.join("doc.md"),
        "nothing of note\nbut zephyr arrived\n",
    )
    .unwrap();
    refresh_index(root, &config).unwrap();

    let hits = quarry_search::search(root, "zephyr", 5, &config).await.unwrap();
    assert!(hits[0].score > 0.0);
    assert!(hits[0].snippet.contains("zephyr"));
}
