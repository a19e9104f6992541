//! Splits raw document text into overlapping, provenance-tagged chunks.
//!
//! Chunking is character-based: offsets and sizes count Unicode scalar
//! values, never bytes, so a chunk boundary can never land inside a code
//! point. The splitter is a pure function of its inputs and produces a lazy,
//! restartable iterator.

use serde::{Deserialize, Serialize};

use crate::config::ChunkerConfig;
use crate::error::Result;

/// A source document queued for ingestion. Immutable once constructed.
#[derive(Clone, Debug)]
pub struct Document {
    /// Opaque source identifier (file path or URI).
    pub source: String,
    /// Page number within the source, when the loader knows it.
    pub page: Option<u32>,
    /// Raw text content.
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            page: None,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// A bounded slice of a document with stable provenance identifiers.
///
/// `sequence_index` and `char_offset` identify the chunk within its source
/// for provenance display; they never change after creation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub page: Option<u32>,
    pub sequence_index: usize,
    pub char_offset: usize,
}

impl Chunk {
    /// Chunk length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Character-window splitter with configured size and overlap.
#[derive(Clone, Copy, Debug)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Builds a chunker, rejecting invalid parameters up front.
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    /// Splits `document` into an ordered, lazy sequence of chunks.
    ///
    /// Consecutive chunks share exactly `chunk_overlap` characters; the last
    /// chunk may be shorter than `chunk_size`. An empty document yields no
    /// chunks. The iterator borrows the document and can be restarted by
    /// calling `split` again.
    pub fn split<'doc>(&self, document: &'doc Document) -> Chunks<'doc> {
        Chunks {
            chars: document.text.chars().collect(),
            source: &document.source,
            page: document.page,
            step: self.config.chunk_size - self.config.chunk_overlap,
            chunk_size: self.config.chunk_size,
            offset: 0,
            sequence_index: 0,
            done: document.text.is_empty(),
        }
    }
}

/// Lazy iterator over a document's chunks. See [`Chunker::split`].
pub struct Chunks<'doc> {
    chars: Vec<char>,
    source: &'doc str,
    page: Option<u32>,
    step: usize,
    chunk_size: usize,
    offset: usize,
    sequence_index: usize,
    done: bool,
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }
        let end = (self.offset + self.chunk_size).min(self.chars.len());
        let chunk = Chunk {
            text: self.chars[self.offset..end].iter().collect(),
            source: self.source.to_string(),
            page: self.page,
            sequence_index: self.sequence_index,
            char_offset: self.offset,
        };
        self.sequence_index += 1;
        if end == self.chars.len() {
            self.done = true;
        } else {
            self.offset += self.step;
        }
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkerConfig::new(size, overlap).unwrap()).unwrap()
    }

    #[test]
    fn covers_document_with_exact_overlap() {
        let doc = Document::new("notes.txt", "abcdefghij");
        let chunks: Vec<_> = chunker(4, 2).split(&doc).collect();

        assert_eq!(chunks[0].text, "abcd");
        assert_eq!(chunks[1].text, "cdef");
        assert_eq!(chunks[2].text, "efgh");
        assert_eq!(chunks[3].text, "ghij");
        assert_eq!(chunks.len(), 4);

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_index, i);
            assert_eq!(chunk.char_offset, i * 2);
            assert_eq!(chunk.source, "notes.txt");
        }
    }

    #[test]
    fn last_chunk_may_be_short() {
        let doc = Document::new("notes.txt", "abcdefg");
        let chunks: Vec<_> = chunker(4, 1).split(&doc).collect();
        assert_eq!(chunks.last().unwrap().text, "g");
        assert!(chunks.iter().all(|c| c.char_len() <= 4));
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        let doc = Document::new("empty.txt", "");
        assert_eq!(chunker(4, 2).split(&doc).count(), 0);
    }

    #[test]
    fn splitting_is_restartable() {
        let doc = Document::new("notes.txt", "abcdefghij");
        let c = chunker(4, 2);
        let first: Vec<_> = c.split(&doc).collect();
        let second: Vec<_> = c.split(&doc).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let doc = Document::new("utf8.txt", "héllö wörld, ünïcode");
        let chunks: Vec<_> = chunker(5, 2).split(&doc).collect();
        let reconstructed: String = chunks
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.text.chars().skip(if i == 0 { 0 } else { 2 }))
            .collect();
        assert_eq!(reconstructed, doc.text);
    }

    #[test]
    fn page_provenance_is_carried() {
        let doc = Document::new("manual.pdf", "some page text").with_page(7);
        let chunks: Vec<_> = chunker(6, 2).split(&doc).collect();
        assert!(chunks.iter().all(|c| c.page == Some(7)));
    }
}
