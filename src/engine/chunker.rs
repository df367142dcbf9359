//! Chunked delivery for over-limit messages.
//!
//! Splitting preserves full message fidelity: concatenating the chunks in
//! index order reproduces the original message byte-for-byte. Boundaries
//! prefer the whitespace nearest the chunk limit and never land inside a
//! multi-byte code point.

use std::{ops::Range, time::Duration};

use crate::{error::SurfaceError, surface::ControlSurface};

/// One ordered piece of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of this chunk in delivery order.
    pub index: usize,
    /// Char-offset range this chunk covers within the original message.
    pub chars: Range<usize>,
    /// The chunk text.
    pub content: String,
}

/// Split `message` into ordered chunks of at most `chunk_size` chars.
///
/// When a chunk would end mid-text, the boundary moves back to just after
/// the last whitespace inside the window, so words survive intact where
/// possible; a window without whitespace is split hard at the limit.
#[must_use]
pub fn chunk_message(message: &str, chunk_size: usize) -> Vec<Chunk> {
    debug_assert!(chunk_size > 0, "chunk_size is validated at configuration");
    if message.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = message.chars().collect();
    let mut byte_offsets = Vec::with_capacity(chars.len() + 1);
    let mut offset = 0;
    for c in &chars {
        byte_offsets.push(offset);
        offset += c.len_utf8();
    }
    byte_offsets.push(message.len());

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let mut end = hard_end;
        if hard_end < chars.len() {
            if let Some(ws) = (start..hard_end).rev().find(|i| chars[*i].is_whitespace()) {
                // Keep the whitespace at the end of the current chunk so
                // reconstruction stays exact.
                if ws > start {
                    end = ws + 1;
                }
            }
        }

        chunks.push(Chunk {
            index: chunks.len(),
            chars: start..end,
            content: message[byte_offsets[start]..byte_offsets[end]].to_string(),
        });
        start = end;
    }

    chunks
}

/// Delivers one message as paced chunks through the control surface.
///
/// No submit action between chunks; one submit after the final chunk.
pub(crate) struct ChunkedSender<'a> {
    surface: &'a dyn ControlSurface,
    pacing: Duration,
}

impl<'a> ChunkedSender<'a> {
    pub(crate) const fn new(surface: &'a dyn ControlSurface, pacing: Duration) -> Self {
        Self { surface, pacing }
    }

    pub(crate) async fn deliver(
        &self,
        message: &str,
        chunk_size: usize,
    ) -> Result<(), SurfaceError> {
        let chunks = chunk_message(message, chunk_size);
        let total = chunks.len();
        for chunk in &chunks {
            if chunk.index > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
            crate::surface!(
                level = DEBUG,
                "Injecting chunk {}/{} ({} chars)",
                chunk.index + 1,
                total,
                chunk.chars.len()
            );
            self.surface.send_keys(&chunk.content).await?;
        }
        self.surface.submit().await?;
        Ok(())
    }
}
