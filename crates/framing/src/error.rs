//! Error types for the wire framer.

use thiserror::Error;

/// Framing error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// First chunk too small to carry the marker and length prefix
    #[error("first chunk of {0} bytes is too short to carry a header")]
    ShortHeader(usize),

    /// Chunk carries more payload than the message has outstanding
    #[error("chunk payload of {got} bytes exceeds the {remaining} bytes outstanding")]
    OverflowChunk { got: usize, remaining: usize },

    /// Requested outbound chunk size is zero or exceeds the characteristic
    #[error("chunk size {requested} is outside the supported range 1..={max}")]
    ChunkSizeOutOfRange { requested: usize, max: usize },
}

/// Result type for framing operations
pub type Result<T> = std::result::Result<T, FramingError>;
