//! Outbound message chunking.
//!
//! Messages handed to [`Chunker::enqueue`] are length-prepended and drained
//! into characteristic-sized slices. The send buffer and cursor survive only
//! for the duration of the drain: once every byte has been emitted the
//! buffer is cleared and the cursor rewinds to zero.

use crate::error::{FramingError, Result};
use crate::{LENGTH_PREFIX_LEN, MAX_CHUNK_SIZE};

/// Outbound chunker with a length-prepended send buffer.
#[derive(Debug)]
pub struct Chunker {
    /// Accumulated bytes awaiting emission (length prefix + payload)
    buffer: Vec<u8>,

    /// Cursor over `buffer`: bytes before it have already been emitted
    sendpos: usize,

    /// Largest slice emitted per characteristic update
    max_send_size: usize,
}

impl Chunker {
    /// Create a chunker emitting slices of at most `max_send_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::ChunkSizeOutOfRange`] when `max_send_size`
    /// is zero or larger than the characteristic can stage.
    pub fn new(max_send_size: usize) -> Result<Self> {
        if max_send_size == 0 || max_send_size > MAX_CHUNK_SIZE {
            return Err(FramingError::ChunkSizeOutOfRange {
                requested: max_send_size,
                max: MAX_CHUNK_SIZE,
            });
        }

        Ok(Self {
            buffer: Vec::new(),
            sendpos: 0,
            max_send_size,
        })
    }

    /// Configured maximum slice size.
    pub fn max_send_size(&self) -> usize {
        self.max_send_size
    }

    /// Queue `payload` for transmission and drain the send buffer.
    ///
    /// Appends a 4-byte big-endian length prefix followed by the payload,
    /// then returns the characteristic updates to emit, in order. The
    /// concatenation of the returned slices is exactly
    /// `[len_be32][payload]`.
    pub fn enqueue(&mut self, payload: &[u8]) -> Vec<Vec<u8>> {
        let total = payload.len() as u32;
        self.buffer.reserve(LENGTH_PREFIX_LEN + payload.len());
        self.buffer.extend_from_slice(&total.to_be_bytes());
        self.buffer.extend_from_slice(payload);

        let mut chunks = Vec::new();
        while self.sendpos < self.buffer.len() {
            let remaining = self.buffer.len() - self.sendpos;
            let size = remaining.min(self.max_send_size);
            chunks.push(self.buffer[self.sendpos..self.sendpos + size].to_vec());
            self.sendpos += size;
        }

        self.buffer.clear();
        self.sendpos = 0;

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_chunk_size() {
        assert!(matches!(
            Chunker::new(0),
            Err(FramingError::ChunkSizeOutOfRange { requested: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_oversized_chunk_size() {
        assert!(Chunker::new(MAX_CHUNK_SIZE).is_ok());
        assert!(matches!(
            Chunker::new(MAX_CHUNK_SIZE + 1),
            Err(FramingError::ChunkSizeOutOfRange { requested, .. }) if requested == MAX_CHUNK_SIZE + 1
        ));
    }

    #[test]
    fn test_small_message_single_chunk() {
        let mut chunker = Chunker::new(128).unwrap();
        let chunks = chunker.enqueue(b"ABC");

        assert_eq!(chunks, vec![vec![0x00, 0x00, 0x00, 0x03, 0x41, 0x42, 0x43]]);
    }

    #[test]
    fn test_hello_split_preserves_stream() {
        let mut chunker = Chunker::new(4).unwrap();
        let chunks = chunker.enqueue(b"HELLO");

        // Every slice respects the configured maximum.
        assert!(chunks.iter().all(|c| c.len() <= 4 && !c.is_empty()));

        // The emitted stream is the length prefix followed by the payload.
        let stream: Vec<u8> = chunks.concat();
        assert_eq!(stream, vec![0x00, 0x00, 0x00, 0x05, 0x48, 0x45, 0x4C, 0x4C, 0x4F]);
    }

    #[test]
    fn test_buffer_drains_completely() {
        let mut chunker = Chunker::new(16).unwrap();
        chunker.enqueue(&[0xAA; 100]);

        // A second message starts from a clean buffer.
        let chunks = chunker.enqueue(b"X");
        assert_eq!(chunks, vec![vec![0x00, 0x00, 0x00, 0x01, b'X']]);
    }

    #[test]
    fn test_empty_payload_emits_header_only() {
        let mut chunker = Chunker::new(128).unwrap();
        let chunks = chunker.enqueue(b"");

        assert_eq!(chunks, vec![vec![0x00, 0x00, 0x00, 0x00]]);
    }

    #[test]
    fn test_exact_multiple_of_chunk_size() {
        let mut chunker = Chunker::new(4).unwrap();
        let chunks = chunker.enqueue(&[0x11, 0x22, 0x33, 0x44]);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], vec![0x00, 0x00, 0x00, 0x04]);
        assert_eq!(chunks[1], vec![0x11, 0x22, 0x33, 0x44]);
    }
}
