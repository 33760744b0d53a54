/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic 0x{found:04X} (expected 0xF00D)")]
    InvalidMagic { found: u16 },

    /// The body exceeds the configured maximum size.
    #[error("frame body too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The declared body cannot hold the control flag, opcode and reserved bytes.
    #[error("frame body too short ({len} bytes, need at least 4)")]
    BodyTooShort { len: usize },

    /// The stream ended inside a frame.
    #[error("truncated frame (expected {expected} bytes, stream ended after {received})")]
    Truncated { expected: usize, received: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
