//! Frame classification and well-known control opcodes.
//!
//! Control frames carry session signaling between client and server.
//! They are never DML messages and decoders skip them.

use crate::codec::Frame;

/// Session offer sent by the server when a connection opens.
pub const SESSION_OFFER: u8 = 0;

/// Session accept sent by the client in response to an offer.
pub const SESSION_ACCEPT: u8 = 3;

/// Keep-alive ping.
pub const KEEP_ALIVE: u8 = 4;

/// Keep-alive response.
pub const KEEP_ALIVE_RSP: u8 = 5;

/// Whether a frame carries session signaling or a DML message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Control,
    Data,
}

impl FrameKind {
    pub fn of(frame: &Frame) -> Self {
        if frame.control {
            Self::Control
        } else {
            Self::Data
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Control => "CONTROL",
            Self::Data => "DATA",
        }
    }
}

/// Returns a human-readable name for a control opcode.
pub fn control_name(opcode: u8) -> &'static str {
    match opcode {
        SESSION_OFFER => "SESSION_OFFER",
        SESSION_ACCEPT => "SESSION_ACCEPT",
        KEEP_ALIVE => "KEEP_ALIVE",
        KEEP_ALIVE_RSP => "KEEP_ALIVE_RSP",
        _ => "UNKNOWN",
    }
}
