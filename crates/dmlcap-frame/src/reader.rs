use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{
    body_len, header_len, split_body, Frame, FrameConfig, EXTENDED_LENGTH_SIZE, FRAME_HEADER_SIZE,
};
use crate::error::{FrameError, Result};

/// Reads complete frames from any `Read` stream.
///
/// Reads exactly one frame per call with no read-ahead, so the underlying
/// stream is always positioned on a frame boundary between calls.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
    frames_read: u64,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            config,
            frames_read: 0,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Ok(None)` when the stream ends exactly on a frame boundary and
    /// `Err(FrameError::Truncated)` when it ends anywhere inside a frame.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut header = [0u8; FRAME_HEADER_SIZE + EXTENDED_LENGTH_SIZE];

        let got = self.fill(&mut header[..FRAME_HEADER_SIZE])?;
        if got == 0 {
            return Ok(None);
        }
        if got < FRAME_HEADER_SIZE {
            return Err(FrameError::Truncated {
                expected: FRAME_HEADER_SIZE,
                received: got,
            });
        }

        let header_size = header_len(&header[..FRAME_HEADER_SIZE])?;
        if header_size > FRAME_HEADER_SIZE {
            let got = self.fill(&mut header[FRAME_HEADER_SIZE..header_size])?;
            if got < EXTENDED_LENGTH_SIZE {
                return Err(FrameError::Truncated {
                    expected: header_size,
                    received: FRAME_HEADER_SIZE + got,
                });
            }
        }

        let body_size = body_len(&header[..header_size], self.config.max_payload_size)?;
        let mut body = BytesMut::zeroed(body_size);
        let got = self.fill(&mut body)?;
        if got < body_size {
            return Err(FrameError::Truncated {
                expected: header_size + body_size,
                received: header_size + got,
            });
        }

        self.frames_read = self.frames_read.saturating_add(1);
        let frame = split_body(body.freeze());
        tracing::trace!(
            index = self.frames_read,
            control = frame.control,
            opcode = frame.opcode,
            len = frame.payload.len(),
            "frame read"
        );
        Ok(Some(frame))
    }

    /// Iterate over the remaining frames. Iteration stops after the first error.
    pub fn frames(&mut self) -> Frames<'_, T> {
        Frames {
            reader: self,
            done: false,
        }
    }

    /// Number of complete frames read so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Read until `buf` is full or the stream ends. Returns the bytes read.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(filled)
    }
}

/// Iterator over frames, created by [`FrameReader::frames`].
pub struct Frames<'a, T> {
    reader: &'a mut FrameReader<T>,
    done: bool,
}

impl<T: Read> Iterator for Frames<'_, T> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
