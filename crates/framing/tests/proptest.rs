//! Property-based tests for the wire framer

use picoble_framing::{Chunker, Reassembler, FIRST_CHUNK_HEADER_LEN};
use proptest::prelude::*;

/// Split a message into central-style chunks: a first chunk carrying the
/// marker, the big-endian total and up to `chunk_size` payload bytes, then
/// continuation chunks of a marker plus up to `chunk_size` payload bytes.
fn central_chunks(message: &[u8], chunk_size: usize, marker: u8) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let total = message.len() as u32;

    let first_len = chunk_size.min(message.len());
    let mut first = Vec::with_capacity(FIRST_CHUNK_HEADER_LEN + first_len);
    first.push(marker);
    first.extend_from_slice(&total.to_be_bytes());
    first.extend_from_slice(&message[..first_len]);
    chunks.push(first);

    let mut pos = first_len;
    while pos < message.len() {
        let len = chunk_size.min(message.len() - pos);
        let mut chunk = Vec::with_capacity(1 + len);
        chunk.push(marker);
        chunk.extend_from_slice(&message[pos..pos + len]);
        chunks.push(chunk);
        pos += len;
    }

    chunks
}

// Property: chunking then reassembling delivers the message exactly once
proptest! {
    #[test]
    fn prop_reassembly_round_trip(
        message in proptest::collection::vec(any::<u8>(), 1..2048),
        chunk_size in 1usize..=128,
        marker in any::<u8>(),
    ) {
        let mut reassembler = Reassembler::new();
        let chunks = central_chunks(&message, chunk_size, marker);
        let mut delivered = Vec::new();

        for chunk in &chunks {
            if let Some(assembled) = reassembler.accept(chunk).unwrap() {
                delivered.push(assembled);
            }
        }

        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0], message);
        assert_eq!(reassembler.remaining(), 0);
    }
}

// Property: back-to-back messages never bleed into each other
proptest! {
    #[test]
    fn prop_consecutive_messages_stay_separate(
        first in proptest::collection::vec(any::<u8>(), 1..256),
        second in proptest::collection::vec(any::<u8>(), 1..256),
        chunk_size in 1usize..=128,
    ) {
        let mut reassembler = Reassembler::new();
        let mut delivered = Vec::new();

        for message in [&first, &second] {
            for chunk in central_chunks(message, chunk_size, 0x00) {
                if let Some(assembled) = reassembler.accept(&chunk).unwrap() {
                    delivered.push(assembled);
                }
            }
        }

        assert_eq!(delivered, vec![first, second]);
    }
}

// Property: the outbound stream is always the length prefix plus payload,
// sliced into chunks no larger than the configured maximum
proptest! {
    #[test]
    fn prop_chunker_stream_is_length_prepended_payload(
        payload in proptest::collection::vec(any::<u8>(), 0..2048),
        max_send_size in 1usize..=207,
    ) {
        let mut chunker = Chunker::new(max_send_size).unwrap();
        let chunks = chunker.enqueue(&payload);

        assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= max_send_size));

        let mut expected = (payload.len() as u32).to_be_bytes().to_vec();
        expected.extend_from_slice(&payload);
        assert_eq!(chunks.concat(), expected);
    }
}
