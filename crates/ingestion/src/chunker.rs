//! Text chunking
//!
//! Deterministic sliding window: each chunk is `chunk_size` characters, the
//! window advances by `chunk_size - chunk_overlap`, and the first window to
//! reach the end of the text is the last one emitted. Chunk counts are
//! therefore a closed-form function of the input length, which keeps
//! re-ingestion predictable.

use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    /// Window advance per step. Falls back to half the window when the
    /// overlap is misconfigured to be >= the size.
    pub fn advance(&self) -> usize {
        if self.chunk_overlap < self.chunk_size {
            self.chunk_size - self.chunk_overlap
        } else {
            (self.chunk_size / 2).max(1)
        }
    }
}

/// One chunk of a source document
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub content: String,
    /// Index within the document this chunk came from
    pub index: usize,
}

/// Split text into overlapping fixed-size chunks
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    if total == 0 {
        return Vec::new();
    }

    let advance = config.advance();
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut index = 0;

    while start < total {
        let end = (start + config.chunk_size).min(total);
        chunks.push(TextChunk {
            content: chars[start..end].iter().collect(),
            index,
        });
        // Once a chunk reaches the end of the text, any further window would
        // be wholly contained in it
        if end == total {
            break;
        }
        index += 1;
        start += advance;
    }

    debug!(
        input_len = total,
        chunk_count = chunks.len(),
        chunk_size = config.chunk_size,
        overlap = config.chunk_overlap,
        "Text chunked"
    );

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk_text("hello world", &ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "hello world");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", &ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn test_overlap_between_consecutive_chunks() {
        let text: String = ('a'..='z').cycle().take(2500).collect();
        let config = ChunkingConfig {
            chunk_size: 1000,
            chunk_overlap: 200,
        };

        let chunks = chunk_text(&text, &config);
        assert!(chunks.len() >= 2);

        // The tail of each chunk repeats at the head of the next one
        let first_tail: String = chunks[0].content.chars().skip(800).collect();
        let second_head: String = chunks[1].content.chars().take(200).collect();
        assert_eq!(first_tail, second_head);
    }

    #[test]
    fn test_chunk_count_formula() {
        let config = ChunkingConfig {
            chunk_size: 1000,
            chunk_overlap: 200,
        };
        let advance = config.advance();

        for total in [1, 799, 800, 801, 1000, 1001, 2500, 10_000] {
            let text: String = "x".repeat(total);
            let expected = if total <= config.chunk_size {
                1
            } else {
                (total - config.chunk_size).div_ceil(advance) + 1
            };
            assert_eq!(
                chunk_text(&text, &config).len(),
                expected,
                "total = {}",
                total
            );
        }
    }

    #[test]
    fn test_exact_window_multiple_has_no_redundant_tail() {
        let config = ChunkingConfig {
            chunk_size: 1000,
            chunk_overlap: 200,
        };

        // Exactly one window
        assert_eq!(chunk_text(&"x".repeat(1000), &config).len(), 1);

        // Second window lands exactly on the end; nothing follows it
        let chunks = chunk_text(&"x".repeat(1800), &config);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content.chars().count(), 1000);
    }

    #[test]
    fn test_degenerate_overlap_still_advances() {
        let config = ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 10,
        };
        let text = "x".repeat(100);
        let chunks = chunk_text(&text, &config);
        // advance falls back to size / 2; the window covering [90, 100)
        // is the last one emitted
        assert_eq!(chunks.len(), 19);
    }
}
