//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` so payloads are split off without copying.
//! Parsing is a two-state machine:
//! - `WaitingForHeader`: Need at least 11 bytes
//! - `WaitingForPayload`: Header parsed, need N more payload bytes

use bytes::{Bytes, BytesMut};

use super::wire_format::{Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use super::Frame;
use crate::error::{ResponseWriterError, Result};

/// Default initial buffer capacity.
const DEFAULT_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Clone)]
enum State {
    WaitingForHeader,
    WaitingForPayload { header: Header },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with the default 1GB payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a new frame buffer with custom max payload size.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(DEFAULT_CAPACITY),
            state: State::WaitingForHeader,
            max_payload_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial frames stay buffered for the next push.
    ///
    /// # Errors
    ///
    /// Returns error if a header fails validation (reserved bits, method ID 0,
    /// payload larger than the configured maximum).
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.state {
                State::WaitingForHeader => {
                    if self.buffer.len() < HEADER_SIZE {
                        return Ok(None);
                    }

                    let header = Header::decode(&self.buffer[..HEADER_SIZE]).ok_or_else(|| {
                        ResponseWriterError::Protocol("Truncated frame header".to_string())
                    })?;
                    header.validate(self.max_payload_size)?;

                    let _ = self.buffer.split_to(HEADER_SIZE);

                    if header.payload_length == 0 {
                        return Ok(Some(Frame::new(header, Bytes::new())));
                    }
                    self.state = State::WaitingForPayload { header };
                }
                State::WaitingForPayload { header } => {
                    let remaining = header.payload_length as usize;
                    if self.buffer.len() < remaining {
                        return Ok(None);
                    }

                    let payload = self.buffer.split_to(remaining).freeze();
                    self.state = State::WaitingForHeader;
                    return Ok(Some(Frame::new(header, payload)));
                }
            }
        }
    }

    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.buffer.len()
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_frame, flags};

    fn reply_bytes(request_id: u32, payload: &[u8]) -> Vec<u8> {
        let header = Header::new(1, flags::RESPONSE, request_id, payload.len() as u32);
        build_frame(&header, payload)
    }

    #[test]
    fn test_several_replies_in_one_push() {
        let mut buffer = FrameBuffer::new();
        let mut data = reply_bytes(1, b"first");
        data.extend(reply_bytes(2, b""));
        data.extend(reply_bytes(3, b"third"));

        let frames = buffer.push(&data).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].payload(), b"first");
        assert!(frames[1].payload().is_empty());
        assert_eq!(frames[2].request_id(), 3);
        assert_eq!(buffer.buffered(), 0);
    }

    #[test]
    fn test_fragmented_header_and_payload() {
        let mut buffer = FrameBuffer::new();
        let payload = b"a reply payload that arrives in pieces";
        let data = reply_bytes(42, payload);

        assert!(buffer.push(&data[..5]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForHeader");
        assert_eq!(buffer.buffered(), 5);

        assert!(buffer.push(&data[5..HEADER_SIZE + 10]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        let frames = buffer.push(&data[HEADER_SIZE + 10..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), payload);
        assert_eq!(buffer.state_name(), "WaitingForHeader");
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let mut frames = Vec::new();
        for byte in reply_bytes(5, b"hi") {
            frames.extend(buffer.push(&[byte]).unwrap());
        }

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"hi");
    }

    #[test]
    fn test_max_payload_validation() {
        let mut buffer = FrameBuffer::with_max_payload(100);
        let header = Header::new(1, flags::RESPONSE, 42, 1000);

        let err = buffer.push(&header.encode()).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_reserved_flags_rejected() {
        let mut buffer = FrameBuffer::new();
        let header = Header::new(1, 0b1000_0010, 1, 0);

        assert!(buffer.push(&header.encode()).is_err());
    }
}
