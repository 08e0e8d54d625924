use thiserror::Error;

/// Size of the big-endian length prefix at the start of every frame.
pub const LENGTH_PREFIX_LEN: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("implausible frame length {length} (limit {limit})")]
    InvalidLength { length: u32, limit: u32 },
}

/// In-order stream bytes waiting to be split into frames.
#[derive(Debug)]
pub struct StreamBuffer {
    buf: Vec<u8>,
    max_frame_len: u32,
}

impl StreamBuffer {
    pub fn new(max_frame_len: u32) -> Self {
        Self {
            buf: Vec::new(),
            max_frame_len,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Split off the next complete frame, length prefix included.
    ///
    /// A length above the limit, or one too small to cover its own prefix,
    /// is reported before waiting for more data.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        if self.buf.len() <= LENGTH_PREFIX_LEN {
            return Ok(None);
        }
        let length = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        if length > self.max_frame_len || (length as usize) < LENGTH_PREFIX_LEN {
            return Err(FrameError::InvalidLength {
                length,
                limit: self.max_frame_len,
            });
        }
        let length = length as usize;
        if self.buf.len() < length {
            return Ok(None);
        }
        let rest = self.buf.split_off(length);
        Ok(Some(std::mem::replace(&mut self.buf, rest)))
    }
}
