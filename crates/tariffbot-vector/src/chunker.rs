//! Splits the reference document into overlapping passages.

use tariffbot_core::error::TariffError;

/// A passage cut from the source document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    /// Byte offset of `text` in the source document.
    pub offset: usize,
    /// Position in document order.
    pub ordinal: usize,
}

/// Character-window splitter.
///
/// Each chunk holds at most `chunk_size` characters. A chunk ends at the
/// last line break in the second half of its window, else the last
/// whitespace, else the hard limit. The next chunk starts `overlap`
/// characters before the previous end, moved forward to a word start.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, TariffError> {
        if chunk_size == 0 {
            return Err(TariffError::Config("chunk_size must be positive".to_string()));
        }
        if overlap >= chunk_size {
            return Err(TariffError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let n = chars.len();
        let byte_at = |i: usize| if i < n { chars[i].0 } else { text.len() };

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < n {
            let hard_end = (start + self.chunk_size).min(n);
            let end = if hard_end == n {
                n
            } else {
                self.break_point(&chars, start, hard_end)
            };

            let slice = &text[byte_at(start)..byte_at(end)];
            let piece = slice.trim();
            if !piece.is_empty() {
                let leading = slice.len() - slice.trim_start().len();
                chunks.push(Chunk {
                    text: piece.to_string(),
                    offset: byte_at(start) + leading,
                    ordinal: chunks.len(),
                });
            }

            if end == n {
                break;
            }

            let mut next = end.saturating_sub(self.overlap).max(start + 1);
            while next < end && !chars[next - 1].1.is_whitespace() {
                next += 1;
            }
            start = next;
        }
        chunks
    }

    fn break_point(&self, chars: &[(usize, char)], start: usize, hard_end: usize) -> usize {
        let floor = start + self.chunk_size / 2;
        let window = (floor.max(start + 1))..=hard_end;

        if let Some(i) = window.clone().rev().find(|&i| chars[i - 1].1 == '\n') {
            return i;
        }
        if let Some(i) = window.rev().find(|&i| chars[i - 1].1.is_whitespace()) {
            return i;
        }
        hard_end
    }
}
