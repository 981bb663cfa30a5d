//! Markdown report writer for search results.
//!
//! `quarry search --report` drops the ranked snippets into
//! `<root>/.quarry/CONTEXT_SNIPPETS.md` so a host tool (or a human) can pick
//! them up as a single context document.

use std::path::{Path, PathBuf};

use chrono::Utc;
use quarry_core::ContextHit;

/// Write the report file and return its path.
pub fn write_report(root: &Path, question: &str, hits: &[ContextHit]) -> std::io::Result<PathBuf> {
    let out = root.join(".quarry").join("CONTEXT_SNIPPETS.md");
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut doc = String::new();
    doc.push_str(&format!("# CONTEXT for: {question}\n\n"));
    doc.push_str(&format!(
        "_Generated {} by quarry v{}_\n\n",
        Utc::now().to_rfc3339(),
        env!("CARGO_PKG_VERSION"),
    ));

    if hits.is_empty() {
        doc.push_str("No matching snippets.\n");
    }
    for hit in hits {
        doc.push_str(&format!(
            "## {}  (lines {}-{}, score {:.3})\n\n",
            hit.path, hit.start_line, hit.end_line, hit.score,
        ));
        doc.push_str("```text\n");
        doc.push_str(&hit.snippet);
        doc.push_str("\n```\n\n");
    }

    std::fs::write(&out, doc)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(path: &str, score: f64) -> ContextHit {
        ContextHit {
            path: path.into(),
            start_line: 1,
            end_line: 5,
            score,
            snippet: "fn demo() {}".into(),
        }
    }

    #[test]
    fn report_contains_question_and_sections() {
        let dir = tempfile::tempdir().unwrap();
        let hits = vec![hit("src/a.rs", 1.25), hit("src/b.rs", 0.5)];

        let out = write_report(dir.path(), "where is auth?", &hits).unwrap();
        assert!(out.ends_with(".quarry/CONTEXT_SNIPPETS.md"));

        let content = std::fs::read_to_string(&out).unwrap();
        assert!(content.starts_with("# CONTEXT for: where is auth?"));
        assert!(content.contains("## src/a.rs  (lines 1-5, score 1.250)"));
        assert!(content.contains("```text\nfn demo() {}\n```"));
    }

    #[test]
    fn empty_results_still_produce_a_report() {
        let dir = tempfile::tempdir().unwrap();
        let out = write_report(dir.path(), "nothing", &[]).unwrap();
        let content = std::fs::read_to_string(&out).unwrap();
        assert!(content.contains("No matching snippets."));
    }
}
