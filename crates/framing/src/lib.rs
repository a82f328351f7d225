//! Length-prefixed chunked message framing for GATT transports.
//!
//! BLE characteristics carry at most a couple of hundred bytes per write or
//! notification, so authentication messages are split into chunks and
//! reassembled on the far side.
//!
//! # Wire format
//!
//! ```text
//! First chunk:        [marker:1][total_length:4 BE][payload ...]
//! Subsequent chunks:  [marker:1][payload ...]
//! ```
//!
//! The marker byte is reserved: it is never interpreted during reassembly
//! and is preserved if a chunk is echoed. Outbound traffic prepends a
//! 4-byte big-endian length to the message and emits the result as raw
//! characteristic-sized slices.

pub mod chunker;
pub mod error;
pub mod reassembler;

pub use chunker::Chunker;
pub use error::{FramingError, Result};
pub use reassembler::Reassembler;

/// Size of the reserved marker byte carried by every inbound chunk.
pub const CHUNK_MARKER_LEN: usize = 1;

/// Size of the big-endian total-length prefix on first chunks.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Header size of an inbound first chunk (marker + length prefix).
pub const FIRST_CHUNK_HEADER_LEN: usize = CHUNK_MARKER_LEN + LENGTH_PREFIX_LEN;

/// Physical size of the GATT characteristic value.
pub const CHARACTERISTIC_LENGTH: usize = 208;

/// Largest chunk a characteristic write can stage (one byte is reserved).
pub const MAX_CHUNK_SIZE: usize = CHARACTERISTIC_LENGTH - 1;

/// Default outbound chunk size.
pub const DEFAULT_MAX_SEND_SIZE: usize = 128;
