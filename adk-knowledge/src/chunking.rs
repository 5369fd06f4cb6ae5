//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and three implementations:
//!
//! - [`FixedSizeChunker`] splits by character count with a sliding overlap
//! - [`RecursiveChunker`] splits by paragraphs, then sentences, then words
//! - [`MarkdownChunker`] splits by headers and records the header path
//!
//! Sizes are measured in characters, never bytes, so multi-byte text is
//! never cut inside a code point.

use serde_json::Value;

use crate::document::Document;

/// Metadata key holding a chunk's position within its parent document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";
/// Metadata key holding the parent document id.
pub const PARENT_ID_KEY: &str = "document_id";
/// Metadata key holding the markdown header hierarchy of a chunk.
pub const HEADER_PATH_KEY: &str = "header_path";

const SEPARATORS: [&str; 5] = ["\n\n", ". ", "! ", "? ", " "];

/// A strategy for splitting documents into smaller documents.
///
/// Chunks carry the parent's metadata plus [`CHUNK_INDEX_KEY`] and
/// [`PARENT_ID_KEY`], and have no embedding. Chunk ids are
/// `{document_id}_{chunk_index}`.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks. Empty content yields no chunks.
    fn chunk(&self, document: &Document) -> Vec<Document>;
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn derive_chunk(parent: &Document, index: usize, content: String) -> Document {
    let mut chunk = Document::new(format!("{}_{index}", parent.id), content);
    chunk.metadata = parent.metadata.clone();
    chunk.metadata.insert(CHUNK_INDEX_KEY.to_string(), Value::from(index));
    chunk.metadata.insert(PARENT_ID_KEY.to_string(), Value::from(parent.id.clone()));
    chunk
}

/// Character windows of `size` advancing by `size - overlap`.
fn windows(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || size == 0 {
        return Vec::new();
    }
    let step = size.saturating_sub(overlap).max(1);
    let mut out = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(chars.len());
        out.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    out
}

/// Split on the first separator, packing segments up to `size` characters.
/// Segments still too large fall through to the next separator, and finally
/// to fixed windows.
fn split_recursive(text: &str, size: usize, overlap: usize, separators: &[&str]) -> Vec<String> {
    if char_len(text) <= size {
        return vec![text.to_string()];
    }
    let Some((separator, rest)) = separators.split_first() else {
        return windows(text, size, overlap);
    };

    let mut pieces = Vec::new();
    let mut current = String::new();
    for segment in text.split_inclusive(separator) {
        if char_len(&current) + char_len(segment) <= size {
            current.push_str(segment);
            continue;
        }
        if !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        if char_len(segment) > size {
            pieces.extend(split_recursive(segment, size, overlap, rest));
        } else {
            current.push_str(segment);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn non_blank(pieces: Vec<String>) -> impl Iterator<Item = String> {
    pieces.into_iter().map(|p| p.trim().to_string()).filter(|p| !p.is_empty())
}

/// Splits text into fixed-size character windows with overlap.
///
/// # Example
///
/// ```rust,ignore
/// use adk_knowledge::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(500, 50);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a chunker producing windows of `chunk_size` characters that
    /// share `chunk_overlap` characters with their predecessor.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }
}

impl Default for FixedSizeChunker {
    fn default() -> Self {
        Self::new(500, 50)
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Document> {
        windows(&document.content, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(i, text)| derive_chunk(document, i, text))
            .collect()
    }
}

/// Splits text hierarchically: paragraphs, sentences, then words.
///
/// Adjacent segments are packed together while they fit in `chunk_size`.
/// Overlap only applies when a single word run has to be cut into windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Document> {
        if document.content.trim().is_empty() {
            return Vec::new();
        }
        let pieces =
            split_recursive(&document.content, self.chunk_size, self.chunk_overlap, &SEPARATORS);
        non_blank(pieces).enumerate().map(|(i, text)| derive_chunk(document, i, text)).collect()
    }
}

/// Splits markdown by headers, prefixing each section with its header path.
///
/// Sections longer than `chunk_size` are split further the way
/// [`RecursiveChunker`] does. Every chunk records its header hierarchy
/// (`"Guide > Install"`) under [`HEADER_PATH_KEY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkdownChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl MarkdownChunker {
    /// Create a new `MarkdownChunker`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }
}

struct Section {
    header_path: String,
    body: String,
}

impl Section {
    fn text(&self) -> String {
        match (self.header_path.is_empty(), self.body.trim().is_empty()) {
            (true, _) => self.body.trim().to_string(),
            (false, true) => self.header_path.clone(),
            (false, false) => format!("{}\n{}", self.header_path, self.body.trim()),
        }
    }
}

fn sections(markdown: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut headers: Vec<String> = Vec::new();
    let mut current = Section { header_path: String::new(), body: String::new() };

    for line in markdown.lines() {
        let trimmed = line.trim_start();
        let level = trimmed.chars().take_while(|c| *c == '#').count();
        if level == 0 {
            current.body.push_str(line);
            current.body.push('\n');
            continue;
        }
        headers.truncate(level - 1);
        headers.push(trimmed[level..].trim().to_string());
        let next = Section { header_path: headers.join(" > "), body: String::new() };
        sections.push(std::mem::replace(&mut current, next));
    }
    sections.push(current);
    sections
}

impl Chunker for MarkdownChunker {
    fn chunk(&self, document: &Document) -> Vec<Document> {
        let mut chunks = Vec::new();
        for section in sections(&document.content) {
            let pieces =
                split_recursive(&section.text(), self.chunk_size, self.chunk_overlap, &SEPARATORS);
            for text in non_blank(pieces) {
                let mut chunk = derive_chunk(document, chunks.len(), text);
                chunk
                    .metadata
                    .insert(HEADER_PATH_KEY.to_string(), Value::from(section.header_path.clone()));
                chunks.push(chunk);
            }
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: &str) -> Document {
        Document::new("doc", content).with_metadata("source", "test")
    }

    #[test]
    fn fixed_size_windows_overlap() {
        let chunks = FixedSizeChunker::new(4, 1).chunk(&doc("abcdefghij"));
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
        assert_eq!(chunks[1].id, "doc_1");
        assert_eq!(chunks[1].metadata[CHUNK_INDEX_KEY], 1);
        assert_eq!(chunks[1].metadata[PARENT_ID_KEY], "doc");
        assert_eq!(chunks[1].metadata["source"], "test");
        assert!(chunks.iter().all(|c| c.embedding.is_none()));
    }

    #[test]
    fn fixed_size_counts_characters() {
        let chunks = FixedSizeChunker::new(2, 0).chunk(&doc("héllo"));
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, vec!["hé", "ll", "o"]);
    }

    #[test]
    fn empty_content_has_no_chunks() {
        assert!(FixedSizeChunker::default().chunk(&doc("")).is_empty());
        assert!(RecursiveChunker::new(10, 0).chunk(&doc("  ")).is_empty());
        assert!(MarkdownChunker::new(10, 0).chunk(&doc("")).is_empty());
    }

    #[test]
    fn recursive_prefers_paragraphs() {
        let chunks = RecursiveChunker::new(20, 0).chunk(&doc("first para\n\nsecond para here"));
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, vec!["first para", "second para here"]);
    }

    #[test]
    fn markdown_records_header_path() {
        let chunks =
            MarkdownChunker::new(200, 0).chunk(&doc("# Guide\nintro\n## Install\nrun it"));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "Guide\nintro");
        assert_eq!(chunks[1].content, "Guide > Install\nrun it");
        assert_eq!(chunks[1].metadata[HEADER_PATH_KEY], "Guide > Install");
    }
}
