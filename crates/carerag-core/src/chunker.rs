//! Recursive character chunker with exact, recorded overlap.
//!
//! Text is first cut into pieces no longer than `max_chars - overlap`
//! (paragraphs, then lines, then sentences, then words, then raw character
//! windows), and pieces are greedily packed into chunks. Every chunk after the
//! first starts with the last `overlap` characters of its predecessor, so
//! `chunks[0] + chunks[1][overlap..] + ...` reproduces the cleaned text.

use tracing::warn;

use crate::config::ChunkingSettings;
use crate::error::{Error, Result};
use crate::stringify::stringify;
use crate::types::{Chunk, Document, DocumentBody};

const SEPARATORS: [&[&str]; 4] = [&["\n\n"], &["\n"], &[". ", "? ", "! "], &[" "]];

#[derive(Debug, Clone)]
pub struct Chunker {
    max_chars: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self { max_chars: 400, overlap: 50 }
    }
}

impl Chunker {
    pub fn new(max_chars: usize, overlap: usize) -> Result<Self> {
        if max_chars == 0 || overlap >= max_chars {
            return Err(Error::InvalidConfig(format!(
                "chunk overlap ({overlap}) must be smaller than max chunk size ({max_chars})"
            )));
        }
        Ok(Self { max_chars, overlap })
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self> {
        Self::new(settings.max_chars, settings.overlap_chars)
    }

    /// Cleans and chunks a document. Empty documents yield no chunks and a warning.
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        let cleaned = clean_text(&document.body);
        let source_path = document.path_string();
        let chunks: Vec<Chunk> = self
            .split_text(&cleaned)
            .into_iter()
            .map(|(text, overlap)| Chunk { text, overlap, source_path: source_path.clone() })
            .collect();
        if chunks.is_empty() {
            warn!(path = %source_path, "document is empty after cleaning; skipping");
        }
        chunks
    }

    /// Splits already-cleaned text into `(chunk_text, overlap_chars)` pairs.
    pub fn split_text(&self, text: &str) -> Vec<(String, usize)> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let mut pieces = Vec::new();
        self.split_range(text, 0, text.len(), 0, &mut pieces);

        let mut chunks = Vec::new();
        let mut i = 0;
        let mut prev_len = 0usize;
        while i < pieces.len() {
            let (piece_start, first_end, first_len) = pieces[i];
            let overlap = if chunks.is_empty() {
                0
            } else {
                self.overlap.min(prev_len)
            };
            let start = back_chars(text, piece_start, overlap);
            let mut len = overlap + first_len;
            let mut end = first_end;
            i += 1;
            while i < pieces.len() && len + pieces[i].2 <= self.max_chars {
                len += pieces[i].2;
                end = pieces[i].1;
                i += 1;
            }
            chunks.push((text[start..end].to_string(), overlap));
            prev_len = len;
        }
        chunks
    }

    /// Pieces leave room for a full overlap in front of them.
    fn piece_limit(&self) -> usize { self.max_chars - self.overlap }

    /// Appends contiguous `(start, end, char_len)` pieces covering `start..end`,
    /// each at most `piece_limit` long.
    fn split_range(&self, text: &str, start: usize, end: usize, level: usize, out: &mut Vec<(usize, usize, usize)>) {
        let len = text[start..end].chars().count();
        if len <= self.piece_limit() {
            if len > 0 {
                out.push((start, end, len));
            }
            return;
        }
        let Some(separators) = SEPARATORS.get(level) else {
            self.split_windows(text, start, end, out);
            return;
        };
        let cuts = cut_points(&text[start..end], separators);
        if cuts.is_empty() {
            self.split_range(text, start, end, level + 1, out);
            return;
        }
        let mut piece_start = start;
        for cut in cuts.into_iter().map(|c| start + c).chain(std::iter::once(end)) {
            if cut > piece_start {
                self.split_range(text, piece_start, cut, level + 1, out);
                piece_start = cut;
            }
        }
    }

    fn split_windows(&self, text: &str, start: usize, end: usize, out: &mut Vec<(usize, usize, usize)>) {
        let limit = self.piece_limit();
        let mut window_start = start;
        let mut count = 0;
        for (offset, _) in text[start..end].char_indices() {
            if count == limit {
                out.push((window_start, start + offset, count));
                window_start = start + offset;
                count = 0;
            }
            count += 1;
        }
        if count > 0 {
            out.push((window_start, end, count));
        }
    }
}

/// Byte offsets just past each separator occurrence (separators stay with the left piece).
fn cut_points(text: &str, separators: &[&str]) -> Vec<usize> {
    let mut cuts: Vec<usize> = separators
        .iter()
        .flat_map(|sep| text.match_indices(sep).map(move |(i, s)| i + s.len()))
        .filter(|&cut| cut < text.len())
        .collect();
    cuts.sort_unstable();
    cuts.dedup();
    cuts
}

/// Byte offset `n` characters before `pos`.
fn back_chars(text: &str, pos: usize, n: usize) -> usize {
    if n == 0 {
        return pos;
    }
    text[..pos].char_indices().rev().nth(n - 1).map_or(0, |(i, _)| i)
}

/// Produces the text that gets chunked for a document body.
pub fn clean_text(body: &DocumentBody) -> String {
    match body {
        DocumentBody::Markdown(raw) => strip_markup(raw).trim().to_string(),
        DocumentBody::Structured(value) => stringify(value).trim().to_string(),
        DocumentBody::Plain(raw) => raw.trim().to_string(),
    }
}

/// Removes heading markers, emphasis markers and code fences.
pub fn strip_markup(raw: &str) -> String {
    raw.lines()
        .map(|line| {
            let trimmed = line.trim_start();
            let line = if trimmed.starts_with('#') {
                trimmed.trim_start_matches('#').trim_start()
            } else {
                line
            };
            line.chars().filter(|c| !matches!(c, '*' | '`')).collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceValue;

    fn reconstruct(chunks: &[(String, usize)]) -> String {
        let mut out = String::new();
        for (text, overlap) in chunks {
            out.extend(text.chars().skip(*overlap));
        }
        out
    }

    fn long_text() -> String {
        let mut text = String::new();
        for p in 0..6 {
            text.push_str(&format!("## Section {p}\n\n"));
            for s in 0..7 {
                text.push_str(&format!("Sentence {s} of paragraph {p} explains a savings product in detail. "));
            }
            text.push_str("\n\n");
        }
        text
    }

    #[test]
    fn chunks_reconstruct_cleaned_text_without_gaps() {
        let chunker = Chunker::new(120, 30).expect("chunker");
        let cleaned = strip_markup(&long_text()).trim().to_string();
        let chunks = chunker.split_text(&cleaned);
        assert!(chunks.len() > 5);
        assert_eq!(reconstruct(&chunks), cleaned);
        let total: usize = chunks.iter().map(|(t, _)| t.chars().count()).sum();
        let overlaps: usize = chunks.iter().map(|(_, o)| o).sum();
        assert_eq!(total - overlaps, cleaned.chars().count());
    }

    #[test]
    fn chunks_respect_max_size_and_share_overlap() {
        let chunker = Chunker::new(100, 20).expect("chunker");
        let text = long_text();
        let chunks = chunker.split_text(&text);
        for (i, (chunk, overlap)) in chunks.iter().enumerate() {
            assert!(chunk.chars().count() <= 100, "chunk {i} too long");
            if i == 0 {
                assert_eq!(*overlap, 0);
            } else {
                let prev: Vec<char> = chunks[i - 1].0.chars().collect();
                let shared: String = prev[prev.len() - overlap..].iter().collect();
                assert!(chunk.starts_with(&shared), "chunk {i} must start with the tail of chunk {}", i - 1);
            }
        }
        assert!(chunks.iter().skip(1).any(|(_, o)| *o == 20));
    }

    #[test]
    fn unbroken_text_falls_back_to_character_windows() {
        let chunker = Chunker::new(10, 3).expect("chunker");
        let text = "ශ්‍රී".repeat(4) + &"x".repeat(25);
        let chunks = chunker.split_text(&text);
        assert!(chunks.iter().all(|(c, _)| c.chars().count() <= 10));
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = Chunker::default();
        let chunks = chunker.split_text("Savings account interest is 5% annually.");
        assert_eq!(chunks, vec![("Savings account interest is 5% annually.".to_string(), 0)]);
    }

    #[test]
    fn empty_documents_yield_no_chunks() {
        let chunker = Chunker::default();
        assert!(chunker.chunk_document(&Document::markdown("kb/empty.md", "  \n\n ")).is_empty());
        assert!(chunker.chunk_document(&Document::markdown("kb/marks.md", "# \n**\n```\n```")).is_empty());
        let structured = Document::structured("kb/empty.json", SourceValue::Object(vec![]));
        assert!(chunker.chunk_document(&structured).is_empty());
    }

    #[test]
    fn markup_is_stripped_before_chunking() {
        let doc = Document::markdown("kb/cards.md", "# Cards\n\n**Gold** card has `no` fee.\n```\ncode\n```");
        let chunks = Chunker::default().chunk_document(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Cards\n\nGold card has no fee.\n\ncode");
        assert_eq!(chunks[0].source_path, "kb/cards.md");
    }

    #[test]
    fn overlap_must_be_smaller_than_max() {
        assert!(Chunker::new(50, 50).is_err());
        assert!(Chunker::new(0, 0).is_err());
    }
}
