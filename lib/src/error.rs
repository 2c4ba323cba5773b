#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Requested bit range is outside the available bits or wider than 64 bits.
    #[error("bit range {start}..{stop} invalid for {num_bits} available bits")]
    BitRange {
        start: usize,
        stop: usize,
        num_bits: usize,
    },

    /// Hit buffer is not exactly the fixed hit size.
    #[error("hit record must be exactly {expected} bytes, got {actual}")]
    HitSize { expected: usize, actual: usize },

    /// Stripped readout length is not a multiple of the frame length.
    #[error("readout length {length} is not a multiple of frame length {frame_length}")]
    FrameLength { length: usize, frame_length: usize },

    #[error("wrong frame header {found:02x?}, expected {expected:02x?}")]
    FrameHeader { found: [u8; 2], expected: [u8; 2] },

    #[error("wrong frame trailer {found:02x?}, expected {expected:02x?}")]
    FrameTrailer { found: [u8; 6], expected: [u8; 6] },

    /// Data file does not start with the expected magic word.
    #[error("invalid magic word {found:02x?}, expected {expected:02x?}")]
    MagicWord { found: [u8; 6], expected: [u8; 6] },

    /// Trailing hit record with fewer than the expected number of bytes.
    #[error("truncated hit record: {actual} of {expected} bytes")]
    Truncated { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
