#[macro_use]
extern crate proptest;

use proptest::prelude::{Strategy, any, prop};

use ragloom::chunker::{Chunker, Document};
use ragloom::config::ChunkerConfig;

/// Valid (chunk_size, chunk_overlap) pairs with overlap < size.
fn config_strategy() -> impl Strategy<Value = (usize, usize)> {
    (2usize..64).prop_flat_map(|size| (proptest::strategy::Just(size), 0usize..size))
}

fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(any::<char>(), 0..512).prop_map(|chars| chars.into_iter().collect())
}

proptest! {
    /// Concatenating each chunk's unique (non-overlapping) portion
    /// reconstructs the document exactly: full coverage, no gaps.
    #[test]
    fn prop_chunks_reconstruct_document(
        (size, overlap) in config_strategy(),
        text in text_strategy(),
    ) {
        let chunker = Chunker::new(ChunkerConfig::new(size, overlap).unwrap()).unwrap();
        let doc = Document::new("prop.txt", text.clone());

        let reconstructed: String = chunker
            .split(&doc)
            .enumerate()
            .flat_map(|(i, chunk)| {
                let skip = if i == 0 { 0 } else { overlap };
                chunk.text.chars().skip(skip).collect::<Vec<_>>()
            })
            .collect();

        prop_assert_eq!(reconstructed, text);
    }

    /// Every chunk fits the configured size and consecutive chunks share
    /// exactly `overlap` characters.
    #[test]
    fn prop_chunk_bounds_and_overlap(
        (size, overlap) in config_strategy(),
        text in text_strategy(),
    ) {
        let chunker = Chunker::new(ChunkerConfig::new(size, overlap).unwrap()).unwrap();
        let doc = Document::new("prop.txt", text);
        let chunks: Vec<_> = chunker.split(&doc).collect();

        for chunk in &chunks {
            prop_assert!(chunk.char_len() <= size);
        }
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let next: Vec<char> = pair[1].text.chars().collect();
            // Only the final chunk may be short, so prev is full-sized here.
            prop_assert_eq!(prev.len(), size);
            prop_assert_eq!(&prev[size - overlap..], &next[..overlap]);
        }
    }

    /// Provenance identifiers advance deterministically.
    #[test]
    fn prop_provenance_offsets(
        (size, overlap) in config_strategy(),
        text in text_strategy(),
    ) {
        let chunker = Chunker::new(ChunkerConfig::new(size, overlap).unwrap()).unwrap();
        let doc = Document::new("prop.txt", text);
        for (i, chunk) in chunker.split(&doc).enumerate() {
            prop_assert_eq!(chunk.sequence_index, i);
            prop_assert_eq!(chunk.char_offset, i * (size - overlap));
        }
    }
}
