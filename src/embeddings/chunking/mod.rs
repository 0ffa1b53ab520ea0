#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{RagError, Result};

/// Windows shorter than this fraction of `chunk_size` (in tenths) are dropped.
const MIN_WINDOW_TENTHS: usize = 1;

/// Configuration for fixed-window chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window length in characters
    pub chunk_size: usize,
    /// Overlap between adjacent windows as a fraction of `chunk_size`
    pub overlap_fraction: f64,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 4000,
            overlap_fraction: 0.15,
        }
    }
}

impl ChunkingConfig {
    /// Overlap in characters, `round(overlap_fraction * chunk_size)`.
    ///
    /// Fails when the fraction is outside `[0, 1)` or the rounded overlap
    /// would leave a non-positive step.
    #[inline]
    pub fn absolute_overlap(&self) -> Result<usize> {
        if !(0.0..1.0).contains(&self.overlap_fraction) {
            return Err(RagError::Config(format!(
                "overlap fraction must be in [0, 1), got {}",
                self.overlap_fraction
            )));
        }

        let overlap = (self.overlap_fraction * self.chunk_size as f64).round() as usize;

        validate_window(self.chunk_size, overlap)?;
        Ok(overlap)
    }

    /// Split `text` using this configuration
    #[inline]
    pub fn split(&self, text: &str) -> Result<Vec<String>> {
        chunk_text(text, self.chunk_size, self.absolute_overlap()?)
    }
}

fn validate_window(chunk_size: usize, overlap: usize) -> Result<()> {
    if overlap >= chunk_size {
        return Err(RagError::Config(format!(
            "overlap ({}) must be smaller than chunk size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}

/// Split `text` into windows of `chunk_size` characters advancing by
/// `chunk_size - overlap`.
///
/// Windows are measured in chars, not bytes. A window shorter than 10% of
/// `chunk_size` is dropped, which in practice only affects the trailing one.
#[inline]
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    validate_window(chunk_size, overlap)?;

    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size - overlap;
    let mut chunks = Vec::with_capacity(chars.len() / step + 1);

    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let window = &chars[start..end];

        if window.len() * 10 >= chunk_size * MIN_WINDOW_TENTHS {
            chunks.push(window.iter().collect::<String>());
        } else {
            debug!(
                "Dropping short window at {} ({} of {} chars)",
                start,
                window.len(),
                chunk_size
            );
        }

        start += step;
    }

    Ok(chunks)
}
