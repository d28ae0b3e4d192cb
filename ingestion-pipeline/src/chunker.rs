//! Fixed-size character windows with overlap.
//!
//! A document of `L` characters split with window `W` and overlap `O`
//! yields `ceil((L - O) / (W - O))` chunks, or exactly one when `L <= W`.
//! Windows advance by `W - O` characters and the last window ends at the
//! end of the text.

use common::{
    error::AppError,
    storage::types::{document::Document, text_chunk::TextChunk},
    utils::config::AppConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    window: usize,
    overlap: usize,
}

impl ChunkingConfig {
    pub fn new(window: usize, overlap: usize) -> Result<Self, AppError> {
        if window == 0 {
            return Err(AppError::Validation(
                "chunk window must be positive".into(),
            ));
        }
        if overlap >= window {
            return Err(AppError::Validation(format!(
                "chunk overlap ({overlap}) must be smaller than the window ({window})"
            )));
        }
        Ok(Self { window, overlap })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub const fn window(&self) -> usize {
        self.window
    }

    pub const fn overlap(&self) -> usize {
        self.overlap
    }

    const fn stride(&self) -> usize {
        self.window.saturating_sub(self.overlap)
    }

    pub fn expected_chunks(&self, char_len: usize) -> usize {
        if char_len <= self.window {
            1
        } else {
            (char_len - self.overlap).div_ceil(self.stride())
        }
    }

    /// Splits `text` into windows measured in characters, never splitting a code point.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_len = boundaries.len().saturating_sub(1);

        let mut chunks = Vec::with_capacity(self.expected_chunks(char_len));
        let mut start = 0usize;
        loop {
            let end = start.saturating_add(self.window).min(char_len);
            let (Some(&from), Some(&to)) = (boundaries.get(start), boundaries.get(end)) else {
                break;
            };
            chunks.push(text.get(from..to).unwrap_or_default().to_string());
            if end >= char_len {
                break;
            }
            start = start.saturating_add(self.stride());
        }
        chunks
    }

    pub fn split_document(&self, document: &Document) -> Vec<TextChunk> {
        self.split_text(&document.text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| TextChunk::new(document, index, text))
            .collect()
    }
}
