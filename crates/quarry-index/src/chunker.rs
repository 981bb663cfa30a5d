//! Fixed-size line chunking.
//!
//! Files are split into consecutive groups of exactly `chunk_lines` lines,
//! with one final non-empty chunk holding the remainder. Together the chunks
//! of a file partition its lines exactly: contiguous, non-overlapping, and
//! covering every line once.

use serde::{Deserialize, Serialize};

/// One fixed-size slice of a file, the unit of indexing and retrieval.
///
/// # Examples
///
/// ```
/// use quarry_index::chunker::Chunk;
///
/// let chunk = Chunk {
///     idx: 0,
///     start_line: 1,
///     end_line: 5,
///     text: "line 1\nline 2\nline 3\nline 4\nline 5\n".into(),
/// };
/// assert_eq!(chunk.end_line - chunk.start_line + 1, 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Zero-based ordinal within the owning file.
    pub idx: u32,
    /// First line of the chunk (1-based, inclusive).
    pub start_line: u32,
    /// Last line of the chunk (1-based, inclusive).
    pub end_line: u32,
    /// The chunk's lines, verbatim, terminators included.
    pub text: String,
}

/// Split `content` into chunks of `chunk_lines` lines each.
///
/// Every chunk except possibly the last holds exactly `chunk_lines` lines;
/// the last holds the remainder (1..`chunk_lines` lines). Chunk text is the
/// verbatim concatenation of its lines, so joining all chunk texts
/// reproduces the input. An empty input produces no chunks.
///
/// # Examples
///
/// ```
/// use quarry_index::chunker::chunk_text;
///
/// let content = "a\nb\nc\nd\ne\nf\ng\n";
/// let chunks = chunk_text(content, 3);
/// assert_eq!(chunks.len(), 3);
/// assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 3));
/// assert_eq!((chunks[2].start_line, chunks[2].end_line), (7, 7));
/// ```
pub fn chunk_text(content: &str, chunk_lines: usize) -> Vec<Chunk> {
    let n = chunk_lines.max(1);
    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut lines_in_buf = 0usize;
    let mut line_no = 0u32;
    let mut start = 1u32;

    for line in content.split_inclusive('\n') {
        buf.push_str(line);
        lines_in_buf += 1;
        line_no += 1;
        if lines_in_buf == n {
            chunks.push(Chunk {
                idx: chunks.len() as u32,
                start_line: start,
                end_line: line_no,
                text: std::mem::take(&mut buf),
            });
            lines_in_buf = 0;
            start = line_no + 1;
        }
    }

    if lines_in_buf > 0 {
        chunks.push(Chunk {
            idx: chunks.len() as u32,
            start_line: start,
            end_line: line_no,
            text: buf,
        });
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(lines: usize) -> String {
        (1..=lines).map(|i| format!("line {i}\n")).collect()
    }

    #[test]
    fn exact_multiple_produces_full_chunks_only() {
        let chunks = chunk_text(&numbered(10), 5);
        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 5));
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (6, 10));
    }

    #[test]
    fn remainder_becomes_short_final_chunk() {
        let chunks = chunk_text(&numbered(7), 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!((chunks[2].start_line, chunks[2].end_line), (7, 7));
        assert_eq!(chunks[2].text, "line 7\n");
    }

    #[test]
    fn file_shorter_than_chunk_size_is_one_chunk() {
        let chunks = chunk_text(&numbered(2), 120);
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 2));
    }

    #[test]
    fn empty_input_produces_no_chunks() {
        assert!(chunk_text("", 120).is_empty());
    }

    #[test]
    fn chunks_partition_the_file_exactly() {
        for (lines, n) in [(1usize, 1usize), (9, 4), (120, 120), (121, 120), (250, 120)] {
            let content = numbered(lines);
            let chunks = chunk_text(&content, n);
            assert_eq!(chunks.len(), lines.div_ceil(n), "lines={lines} n={n}");

            let mut expected_start = 1u32;
            for chunk in &chunks {
                assert_eq!(chunk.start_line, expected_start);
                expected_start = chunk.end_line + 1;
            }
            assert_eq!(chunks.last().unwrap().end_line as usize, lines);

            let rejoined: String = chunks.iter().map(|c| c.text.as_str()).collect();
            assert_eq!(rejoined, content);
        }
    }

    #[test]
    fn missing_trailing_newline_is_preserved() {
        let chunks = chunk_text("a\nb\nc", 2);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "c");
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (3, 3));
    }

    #[test]
    fn ordinals_are_sequential_from_zero() {
        let chunks = chunk_text(&numbered(10), 3);
        let idxs: Vec<u32> = chunks.iter().map(|c| c.idx).collect();
        assert_eq!(idxs, vec![0, 1, 2, 3]);
    }
}
