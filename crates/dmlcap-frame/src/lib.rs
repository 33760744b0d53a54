//! Length-prefixed framing for DML game protocol captures.
//!
//! Every frame on the wire carries:
//! - A 2-byte magic number (`0xF00D`, little-endian) for stream synchronization
//! - A 2-byte little-endian body length, widened to 4 bytes for large frames
//! - A 4-byte body header: control flag, opcode, two reserved bytes
//!
//! Readers hand out one complete frame per call and keep a clean end of
//! stream distinct from a capture that stops halfway through a frame.

pub mod codec;
pub mod error;
pub mod kind;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, BODY_HEADER_SIZE, DEFAULT_MAX_PAYLOAD,
    EXTENDED_LENGTH_SIZE, FRAME_HEADER_SIZE, LARGE_FRAME_THRESHOLD, MAGIC,
};
pub use error::{FrameError, Result};
pub use kind::{
    control_name, FrameKind, KEEP_ALIVE, KEEP_ALIVE_RSP, SESSION_ACCEPT, SESSION_OFFER,
};
pub use reader::{FrameReader, Frames};
pub use writer::FrameWriter;
