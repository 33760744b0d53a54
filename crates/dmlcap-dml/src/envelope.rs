use bytes::{BufMut, Bytes, BytesMut};

use crate::error::EnvelopeError;

/// Envelope header: service (1) + order (1) + length (2) = 4 bytes.
pub const ENVELOPE_HEADER_SIZE: usize = 4;

/// A DML message addressed to a service, as carried by a data frame.
///
/// ```text
/// ┌──────────────┬──────────────┬───────────────┬──────────────┐
/// │ Service (1B) │ Order (1B)   │ Length (2B LE)│ Record bytes │
/// └──────────────┴──────────────┴───────────────┴──────────────┘
/// ```
///
/// `declared_len` is what the sender wrote (header included). It is kept for
/// diagnostics; `payload` is always everything after the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub service_id: u8,
    pub order_number: u8,
    pub declared_len: u16,
    pub payload: Bytes,
}

impl Envelope {
    /// Create an envelope whose declared length matches its payload.
    pub fn new(service_id: u8, order_number: u8, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let declared_len =
            u16::try_from(ENVELOPE_HEADER_SIZE + payload.len()).unwrap_or(u16::MAX);
        Self {
            service_id,
            order_number,
            declared_len,
            payload,
        }
    }

    /// Split a data frame payload into its envelope. The record bytes are not copied.
    pub fn decode(frame_payload: Bytes) -> Result<Self, EnvelopeError> {
        if frame_payload.len() < ENVELOPE_HEADER_SIZE {
            return Err(EnvelopeError::TooShort {
                len: frame_payload.len(),
            });
        }

        Ok(Self {
            service_id: frame_payload[0],
            order_number: frame_payload[1],
            declared_len: u16::from_le_bytes([frame_payload[2], frame_payload[3]]),
            payload: frame_payload.slice(ENVELOPE_HEADER_SIZE..),
        })
    }

    /// Encode into a data frame payload.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(ENVELOPE_HEADER_SIZE + self.payload.len());
        dst.put_u8(self.service_id);
        dst.put_u8(self.order_number);
        dst.put_u16_le(self.declared_len);
        dst.put_slice(&self.payload);
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}
