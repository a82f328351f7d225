//! Inbound chunk reassembly.
//!
//! A first chunk declares the total payload length; continuation chunks top
//! the assembly buffer up until the declared total has arrived, at which
//! point the message is delivered exactly once. Malformed chunks are
//! rejected without disturbing an assembly already in progress.

use crate::error::{FramingError, Result};
use crate::{CHUNK_MARKER_LEN, FIRST_CHUNK_HEADER_LEN, LENGTH_PREFIX_LEN};

/// Inbound reassembler for length-prefixed chunked messages.
#[derive(Debug, Default)]
pub struct Reassembler {
    /// Payload bytes collected so far
    assembly: Vec<u8>,

    /// Bytes still expected before the message is complete
    remaining: usize,
}

impl Reassembler {
    /// Create an idle reassembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes still outstanding for the message being assembled.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Whether a message is currently being assembled.
    pub fn in_progress(&self) -> bool {
        self.remaining > 0
    }

    /// Feed one raw chunk as written by the central.
    ///
    /// Returns `Ok(Some(message))` when the chunk completes a message,
    /// `Ok(None)` when more chunks are expected.
    ///
    /// # Errors
    ///
    /// * [`FramingError::ShortHeader`] — a first chunk of 5 bytes or fewer,
    ///   or an empty continuation chunk.
    /// * [`FramingError::OverflowChunk`] — more payload than the declared
    ///   total has outstanding; the chunk is discarded and the assembly
    ///   state is left untouched.
    pub fn accept(&mut self, chunk: &[u8]) -> Result<Option<Vec<u8>>> {
        let payload = if self.remaining == 0 {
            // Idle: this must be a first chunk carrying the full header.
            if chunk.len() <= FIRST_CHUNK_HEADER_LEN {
                return Err(FramingError::ShortHeader(chunk.len()));
            }

            let mut length = [0u8; LENGTH_PREFIX_LEN];
            length.copy_from_slice(&chunk[CHUNK_MARKER_LEN..FIRST_CHUNK_HEADER_LEN]);
            self.assembly.clear();
            self.remaining = u32::from_be_bytes(length) as usize;

            &chunk[FIRST_CHUNK_HEADER_LEN..]
        } else {
            if chunk.is_empty() {
                return Err(FramingError::ShortHeader(0));
            }

            &chunk[CHUNK_MARKER_LEN..]
        };

        if payload.len() > self.remaining {
            return Err(FramingError::OverflowChunk {
                got: payload.len(),
                remaining: self.remaining,
            });
        }

        self.assembly.extend_from_slice(payload);
        self.remaining -= payload.len();

        if self.remaining == 0 {
            Ok(Some(std::mem::take(&mut self.assembly)))
        } else {
            Ok(None)
        }
    }

    /// Discard any partially assembled message.
    pub fn reset(&mut self) {
        self.assembly.clear();
        self.remaining = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_chunk_message() {
        let mut reassembler = Reassembler::new();

        let delivered = reassembler
            .accept(&[0x00, 0x00, 0x00, 0x00, 0x03, 0x41, 0x42, 0x43])
            .unwrap();

        assert_eq!(delivered, Some(b"ABC".to_vec()));
        assert_eq!(reassembler.remaining(), 0);
    }

    #[test]
    fn test_two_chunk_message() {
        let mut reassembler = Reassembler::new();

        // Declared total 5, first chunk carries "HE".
        let first = reassembler
            .accept(&[0x00, 0x00, 0x00, 0x00, 0x05, b'H', b'E'])
            .unwrap();
        assert_eq!(first, None);
        assert_eq!(reassembler.remaining(), 3);
        assert!(reassembler.in_progress());

        let second = reassembler.accept(&[0x01, b'L', b'L', b'O']).unwrap();
        assert_eq!(second, Some(b"HELLO".to_vec()));
        assert!(!reassembler.in_progress());
    }

    #[test]
    fn test_marker_byte_is_ignored() {
        let mut reassembler = Reassembler::new();

        // Arbitrary marker values must not affect reassembly.
        reassembler
            .accept(&[0xFF, 0x00, 0x00, 0x00, 0x04, b'p', b'i'])
            .unwrap();
        let delivered = reassembler.accept(&[0x7B, b'c', b'o']).unwrap();

        assert_eq!(delivered, Some(b"pico".to_vec()));
    }

    #[test]
    fn test_short_first_chunk_rejected() {
        let mut reassembler = Reassembler::new();

        for len in 0..=FIRST_CHUNK_HEADER_LEN {
            let chunk = vec![0u8; len];
            assert_eq!(
                reassembler.accept(&chunk),
                Err(FramingError::ShortHeader(len))
            );
        }
    }

    #[test]
    fn test_empty_continuation_chunk_rejected() {
        let mut reassembler = Reassembler::new();
        reassembler
            .accept(&[0x00, 0x00, 0x00, 0x00, 0x08, 0xAA])
            .unwrap();

        assert_eq!(reassembler.accept(&[]), Err(FramingError::ShortHeader(0)));
        // The assembly in progress is unaffected.
        assert_eq!(reassembler.remaining(), 7);
    }

    #[test]
    fn test_overflowing_first_chunk_discarded() {
        let mut reassembler = Reassembler::new();

        // Declared total 3 but 5 payload bytes follow the header.
        let result =
            reassembler.accept(&[0x00, 0x00, 0x00, 0x00, 0x03, 0x01, 0x02, 0x03, 0x04, 0x05]);

        assert_eq!(
            result,
            Err(FramingError::OverflowChunk {
                got: 5,
                remaining: 3
            })
        );
        // The declared total stands; a continuation can still complete it.
        assert_eq!(reassembler.remaining(), 3);

        let delivered = reassembler.accept(&[0x00, 0x61, 0x62, 0x63]).unwrap();
        assert_eq!(delivered, Some(b"abc".to_vec()));
    }

    #[test]
    fn test_overflowing_continuation_chunk_discarded() {
        let mut reassembler = Reassembler::new();
        reassembler
            .accept(&[0x00, 0x00, 0x00, 0x00, 0x04, 0x10, 0x20])
            .unwrap();

        let result = reassembler.accept(&[0x00, 0x30, 0x40, 0x50]);
        assert_eq!(
            result,
            Err(FramingError::OverflowChunk {
                got: 3,
                remaining: 2
            })
        );

        // Assembly continues with a well-formed chunk.
        let delivered = reassembler.accept(&[0x00, 0x30, 0x40]).unwrap();
        assert_eq!(delivered, Some(vec![0x10, 0x20, 0x30, 0x40]));
    }

    #[test]
    fn test_exact_fill_delivers_once() {
        let mut reassembler = Reassembler::new();

        let delivered = reassembler
            .accept(&[0x00, 0x00, 0x00, 0x00, 0x02, 0xDE, 0xAD])
            .unwrap();
        assert_eq!(delivered, Some(vec![0xDE, 0xAD]));

        // A fresh message starts from scratch.
        let next = reassembler
            .accept(&[0x00, 0x00, 0x00, 0x00, 0x01, 0xBE])
            .unwrap();
        assert_eq!(next, Some(vec![0xBE]));
    }

    #[test]
    fn test_reset_discards_partial_assembly() {
        let mut reassembler = Reassembler::new();
        reassembler
            .accept(&[0x00, 0x00, 0x00, 0x00, 0x10, 0x01, 0x02])
            .unwrap();

        reassembler.reset();
        assert_eq!(reassembler.remaining(), 0);

        // The next chunk is treated as a first chunk again.
        let delivered = reassembler
            .accept(&[0x00, 0x00, 0x00, 0x00, 0x01, 0x99])
            .unwrap();
        assert_eq!(delivered, Some(vec![0x99]));
    }
}
