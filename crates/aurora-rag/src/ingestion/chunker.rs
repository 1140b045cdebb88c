//! Fixed-size overlapping text chunking with page tracking

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::{PageSegment, TextChunk};

/// Splits page text into chunks of at most `chunk_size` characters,
/// consecutive chunks sharing exactly `overlap` characters.
///
/// Chunks never span pages. Lengths are counted in Unicode scalar values.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk size in characters
    chunk_size: usize,
    /// Overlap between chunks in characters
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker; size and overlap must be positive and overlap smaller than size
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        ChunkingConfig {
            chunk_size,
            chunk_overlap: overlap,
        }
        .validate()?;

        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Create a chunker from configuration
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk every page, preserving page order
    pub fn split_pages(&self, pages: &[PageSegment]) -> Vec<TextChunk> {
        pages.iter().flat_map(|page| self.split_page(page)).collect()
    }

    /// Chunk a single page
    pub fn split_page(&self, page: &PageSegment) -> Vec<TextChunk> {
        if page.text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = page.text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut index = 0u32;

        loop {
            let hard_end = (start + self.chunk_size).min(total);
            let end = if hard_end < total {
                self.snap_to_word_boundary(&chars[start..hard_end])
                    .map(|len| start + len)
                    .unwrap_or(hard_end)
            } else {
                hard_end
            };

            chunks.push(TextChunk {
                text: chars[start..end].iter().collect(),
                metadata: page.metadata.clone(),
                index,
                char_start: start,
            });
            index += 1;

            if end >= total {
                break;
            }
            // end > start + overlap, so this always advances
            start = end - self.overlap;
        }

        chunks
    }

    /// Length (in chars) of the longest prefix of `window` ending on a word boundary
    /// that is still longer than the overlap
    fn snap_to_word_boundary(&self, window: &[char]) -> Option<usize> {
        let text: String = window.iter().collect();
        let mut best = None;
        let mut char_pos = 0usize;
        let mut last_byte = 0usize;

        for (byte_idx, _) in text.split_word_bound_indices() {
            char_pos += text[last_byte..byte_idx].chars().count();
            last_byte = byte_idx;
            if char_pos > self.overlap && char_pos < window.len() {
                best = Some(char_pos);
            }
        }

        best
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        let defaults = ChunkingConfig::default();
        Self {
            chunk_size: defaults.chunk_size,
            overlap: defaults.chunk_overlap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::SourceMetadata;

    fn page(text: &str, number: u32) -> PageSegment {
        PageSegment::new(text, SourceMetadata::new("book.pdf", number))
    }

    /// Undo the overlap between consecutive chunks of one page
    fn reassemble(chunks: &[TextChunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&chunk.text);
            } else {
                out.extend(chunk.text.chars().skip(overlap));
            }
        }
        out
    }

    fn sample_text(words: usize) -> String {
        (0..words)
            .map(|i| format!("word{}", i % 97))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(TextChunker::new(0, 0), Err(Error::Config(_))));
        assert!(matches!(TextChunker::new(100, 0), Err(Error::Config(_))));
        assert!(matches!(TextChunker::new(100, 100), Err(Error::Config(_))));
        assert!(TextChunker::new(1000, 200).is_ok());
    }

    #[test]
    fn test_short_page_is_one_chunk() {
        let chunker = TextChunker::new(1000, 200).unwrap();
        let chunks = chunker.split_page(&page("Ivan Vazov wrote Under the Yoke.", 0));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Ivan Vazov wrote Under the Yoke.");
        assert_eq!(chunks[0].char_start, 0);
    }

    #[test]
    fn test_chunks_bounded_and_overlap_exact() {
        let chunker = TextChunker::new(100, 20).unwrap();
        let text = sample_text(400);
        let chunks = chunker.split_page(&page(&text, 0));

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.char_len() <= 100);
        }
        for pair in chunks.windows(2) {
            let tail: String = pair[0]
                .text
                .chars()
                .skip(pair[0].char_len() - 20)
                .collect();
            let head: String = pair[1].text.chars().take(20).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_reassembly_reproduces_page() {
        let chunker = TextChunker::new(120, 30).unwrap();
        let text = sample_text(500);
        let chunks = chunker.split_page(&page(&text, 0));
        assert_eq!(reassemble(&chunks, 30), text);
    }

    #[test]
    fn test_unbroken_text_uses_hard_cut() {
        let chunker = TextChunker::new(50, 10).unwrap();
        let text = "x".repeat(130);
        let chunks = chunker.split_page(&page(&text, 0));

        let lens: Vec<usize> = chunks.iter().map(TextChunk::char_len).collect();
        assert_eq!(lens, vec![50, 50, 50]);
        assert_eq!(reassemble(&chunks, 10), text);
    }

    #[test]
    fn test_multibyte_text_counts_chars() {
        let chunker = TextChunker::new(40, 8).unwrap();
        let text = "Под игото е роман от Иван Вазов за живота в България. ".repeat(6);
        let chunks = chunker.split_page(&page(&text, 0));

        for chunk in &chunks {
            assert!(chunk.char_len() <= 40);
        }
        assert_eq!(reassemble(&chunks, 8), text);
    }

    #[test]
    fn test_chunks_keep_page_metadata() {
        let chunker = TextChunker::new(60, 10).unwrap();
        let pages = vec![page(&sample_text(40), 0), page("   ", 1), page(&sample_text(40), 2)];
        let chunks = chunker.split_pages(&pages);

        assert!(chunks.iter().all(|c| c.metadata.page != 1));
        let first_page_two = chunks.iter().position(|c| c.metadata.page == 2).unwrap();
        // indices restart on each page and no chunk mixes pages
        assert_eq!(chunks[first_page_two].index, 0);
        assert_eq!(chunks[first_page_two].char_start, 0);
        assert!(chunks[..first_page_two].iter().all(|c| c.metadata.page == 0));
    }
}
