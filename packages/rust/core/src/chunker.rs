//! Overlapping text chunking.
//!
//! Splits extracted text on blank-line boundaries and accumulates paragraphs
//! up to a target character budget. When a chunk is sealed, the next buffer
//! is seeded with the sealed chunk's trailing `overlap` characters so
//! consecutive chunks share context. Character counts are Unicode scalar
//! counts throughout.

/// One produced chunk, 0-indexed within its document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Contiguous ordinal starting at 0.
    pub index: u32,
    /// Chunk text.
    pub content: String,
    /// Approximate token count: `ceil(chars / 4)`.
    pub tokens: u32,
}

/// Split `text` into overlapping chunks of roughly `target_chars` characters.
///
/// A single paragraph longer than the budget is not split further — it
/// becomes one oversized chunk. Never produces an empty chunk.
pub fn chunk_text(text: &str, target_chars: usize, overlap: usize) -> Vec<Chunk> {
    let mut pieces: Vec<String> = Vec::new();
    let mut buf = String::new();

    for para in text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }

        if !buf.is_empty() && char_len(&buf) + char_len(para) + 2 > target_chars {
            pieces.push(buf.clone());
            buf = tail_chars(&buf, overlap);
        }

        if !buf.is_empty() {
            buf.push_str("\n\n");
        }
        buf.push_str(para);
    }

    let trailing = buf.trim();
    if !trailing.is_empty() {
        pieces.push(trailing.to_string());
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, content)| {
            let tokens = char_len(&content).div_ceil(4) as u32;
            Chunk {
                index: i as u32,
                content,
                tokens,
            }
        })
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The last `n` characters of `s` (the whole string when shorter).
fn tail_chars(s: &str, n: usize) -> String {
    let len = char_len(s);
    s.chars().skip(len.saturating_sub(n)).collect()
}
