//! Word-window chunking implementation.

use super::{Chunk, ChunkingConfig};
use crate::transcript::Transcript;

/// Fixed-size word-window chunker.
///
/// Each word carries the timing of the segment it came from, so a chunk spans
/// from the start of its first word's segment to the end of its last.
pub struct WindowChunker {
    config: ChunkingConfig,
}

impl WindowChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    fn window(&self) -> usize {
        self.config.window_words.max(1)
    }

    /// Words advanced between consecutive windows.
    fn step(&self) -> usize {
        let window = self.window();
        let overlap = (window as f32 * self.config.overlap_ratio.clamp(0.0, 1.0)).round() as usize;
        window.saturating_sub(overlap).max(1)
    }

    /// Split a transcript into chunks.
    pub fn chunk(&self, transcript: &Transcript) -> Vec<Chunk> {
        let words: Vec<(&str, f64, f64)> = transcript
            .segments()
            .iter()
            .flat_map(|seg| {
                let (start, end) = (seg.start, seg.end());
                seg.text.split_whitespace().map(move |w| (w, start, end))
            })
            .collect();

        let mut chunks = Vec::new();
        if words.is_empty() {
            return chunks;
        }

        let (window, step) = (self.window(), self.step());
        let mut start = 0;

        loop {
            let end = (start + window).min(words.len());
            let slice = &words[start..end];

            let text = slice.iter().map(|(w, _, _)| *w).collect::<Vec<_>>().join(" ");
            chunks.push(Chunk::new(
                transcript.video_id(),
                chunks.len(),
                slice[0].1,
                slice[slice.len() - 1].2,
                text,
            ));

            if end == words.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

impl Default for WindowChunker {
    fn default() -> Self {
        Self::new(ChunkingConfig::default())
    }
}
