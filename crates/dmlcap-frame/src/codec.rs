use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: magic (2) + length (2) = 4 bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Extra length field present when the short length exceeds [`LARGE_FRAME_THRESHOLD`].
pub const EXTENDED_LENGTH_SIZE: usize = 4;

/// Body header: control (1) + opcode (1) + reserved (2) = 4 bytes.
pub const BODY_HEADER_SIZE: usize = 4;

/// Magic number, stored little-endian as `0x0D 0xF0`.
pub const MAGIC: u16 = 0xF00D;

/// Largest body length expressible in the short length field.
pub const LARGE_FRAME_THRESHOLD: usize = 0x7FFF;

/// Short length value written in front of an extended length.
const LARGE_FRAME_MARKER: u16 = 0x8000;

/// Default maximum body size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// A single frame extracted from a capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Transport-level signaling rather than a DML message.
    pub control: bool,
    /// Control opcode. Zero for data frames.
    pub opcode: u8,
    /// Bytes following the body header.
    pub payload: Bytes,
}

impl Frame {
    /// Create a data frame carrying an encoded DML message.
    pub fn data(payload: impl Into<Bytes>) -> Self {
        Self {
            control: false,
            opcode: 0,
            payload: payload.into(),
        }
    }

    /// Create a control frame.
    pub fn control(opcode: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            control: true,
            opcode,
            payload: payload.into(),
        }
    }

    /// Body length as declared on the wire (body header + payload).
    pub fn body_len(&self) -> usize {
        BODY_HEADER_SIZE + self.payload.len()
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        let body_len = self.body_len();
        let header = if body_len > LARGE_FRAME_THRESHOLD {
            FRAME_HEADER_SIZE + EXTENDED_LENGTH_SIZE
        } else {
            FRAME_HEADER_SIZE
        };
        header + body_len
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬────────────┬────────────────────┬─────────┬────────┬──────────┬─────────┐
/// │ Magic (2B) │ Length     │ Ext length (4B LE) │ Control │ Opcode │ Reserved │ Payload │
/// │ 0x0D 0xF0  │ (2B LE)    │ if Length > 0x7FFF │ (1B)    │ (1B)   │ (2B)     │         │
/// └────────────┴────────────┴────────────────────┴─────────┴────────┴──────────┴─────────┘
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let body_len = frame.body_len();
    if body_len > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: body_len,
            max: u32::MAX as usize,
        });
    }

    dst.reserve(frame.wire_size());
    dst.put_u16_le(MAGIC);
    if body_len > LARGE_FRAME_THRESHOLD {
        dst.put_u16_le(LARGE_FRAME_MARKER);
        dst.put_u32_le(body_len as u32);
    } else {
        dst.put_u16_le(body_len as u16);
    }
    dst.put_u8(u8::from(frame.control));
    dst.put_u8(frame.opcode);
    dst.put_u16_le(0);
    dst.put_slice(&frame.payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }

    let header_len = header_len(&src[..FRAME_HEADER_SIZE])?;
    if src.len() < header_len {
        return Ok(None);
    }

    let body_len = body_len(&src[..header_len], max_payload)?;
    if src.len() < header_len + body_len {
        return Ok(None);
    }

    src.advance(header_len);
    let body = src.split_to(body_len).freeze();
    Ok(Some(split_body(body)))
}

/// Validate the fixed header prefix and return the full header length.
pub(crate) fn header_len(prefix: &[u8]) -> Result<usize> {
    let magic = u16::from_le_bytes([prefix[0], prefix[1]]);
    if magic != MAGIC {
        return Err(FrameError::InvalidMagic { found: magic });
    }

    let short_len = u16::from_le_bytes([prefix[2], prefix[3]]) as usize;
    if short_len > LARGE_FRAME_THRESHOLD {
        Ok(FRAME_HEADER_SIZE + EXTENDED_LENGTH_SIZE)
    } else {
        Ok(FRAME_HEADER_SIZE)
    }
}

/// Read the body length from a complete header (as sized by [`header_len`]).
pub(crate) fn body_len(header: &[u8], max_payload: usize) -> Result<usize> {
    let len = if header.len() >= FRAME_HEADER_SIZE + EXTENDED_LENGTH_SIZE {
        u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize
    } else {
        u16::from_le_bytes([header[2], header[3]]) as usize
    };

    if len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: max_payload,
        });
    }
    if len < BODY_HEADER_SIZE {
        return Err(FrameError::BodyTooShort { len });
    }
    Ok(len)
}

/// Split a complete body into its header fields and payload.
pub(crate) fn split_body(body: Bytes) -> Frame {
    Frame {
        control: body[0] != 0,
        opcode: body[1],
        payload: body.slice(BODY_HEADER_SIZE..),
    }
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum body size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_data_frame() {
        let mut buf = BytesMut::new();
        let frame = Frame::data(Bytes::from_static(b"\x05\x02\x08\x00hello"));

        encode_frame(&frame, &mut buf).unwrap();
        assert_eq!(buf.len(), frame.wire_size());
        assert_eq!(&buf[..2], &[0x0D, 0xF0]);

        let decoded = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn control_flag_and_opcode_survive() {
        let mut buf = BytesMut::new();
        encode_frame(&Frame::control(4, Bytes::new()), &mut buf).unwrap();

        let decoded = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(decoded.control);
        assert_eq!(decoded.opcode, 4);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn any_nonzero_control_byte_is_control() {
        let mut buf = BytesMut::from(&[0x0D, 0xF0, 0x04, 0x00, 0x7F, 0x03, 0x00, 0x00][..]);
        let decoded = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(decoded.control);
        assert_eq!(decoded.opcode, 3);
    }

    #[test]
    fn large_frame_uses_extended_length() {
        let payload = vec![0x5A; LARGE_FRAME_THRESHOLD + 10];
        let frame = Frame::data(payload.clone());
        let mut buf = BytesMut::new();
        encode_frame(&frame, &mut buf).unwrap();

        assert_eq!(u16::from_le_bytes([buf[2], buf[3]]), 0x8000);
        assert_eq!(
            u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize,
            payload.len() + BODY_HEADER_SIZE
        );

        let decoded = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(decoded.payload.as_ref(), payload.as_slice());
    }

    #[test]
    fn decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x0D, 0xF0, 0x08][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());
    }

    #[test]
    fn decode_incomplete_extended_header() {
        let mut buf = BytesMut::from(&[0x0D, 0xF0, 0x00, 0x80, 0x10][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn decode_incomplete_body() {
        let mut buf = BytesMut::new();
        encode_frame(&Frame::data(Bytes::from_static(b"hello")), &mut buf).unwrap();
        buf.truncate(buf.len() - 2);

        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());
    }

    #[test]
    fn decode_invalid_magic() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(
            result,
            Err(FrameError::InvalidMagic { found: 0xFFFF })
        ));
    }

    #[test]
    fn decode_body_too_short() {
        let mut buf = BytesMut::from(&[0x0D, 0xF0, 0x02, 0x00, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::BodyTooShort { len: 2 })));
    }

    #[test]
    fn decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u16_le(MAGIC);
        buf.put_u16_le(LARGE_FRAME_MARKER);
        buf.put_u32_le(32 * 1024 * 1024);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn multiple_frames_in_one_buffer() {
        let mut buf = BytesMut::new();
        encode_frame(&Frame::data(Bytes::from_static(b"first")), &mut buf).unwrap();
        encode_frame(&Frame::control(5, Bytes::new()), &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        let f2 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!(f1.payload.as_ref(), b"first");
        assert!(!f1.control);
        assert!(f2.control);
        assert_eq!(f2.opcode, 5);
        assert!(buf.is_empty());
    }
}
