//! Wire format encoding and decoding.
//!
//! Every call and reply starts with an 11-byte header:
//! ```text
//! ┌──────────┬───────┬──────────┬──────────┐
//! │ Method ID│ Flags │ Req ID   │ Length   │
//! │ 2 bytes  │ 1 byte│ 4 bytes  │ 4 bytes  │
//! │ uint16 BE│       │ uint32 BE│ uint32 BE│
//! └──────────┴───────┴──────────┴──────────┘
//! ```
//!
//! All multi-byte integers are Big Endian.

use crate::error::{ResponseWriterError, Result};

/// Header size in bytes (fixed, exactly 11).
pub const HEADER_SIZE: usize = 11;

/// Default maximum payload size (1 GB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 1_073_741_824;

/// Reserved method ID (never used on the wire).
pub const RESERVED_METHOD_ID: u16 = 0;

/// Request ID that no call ever carries.
pub const RESERVED_REQUEST_ID: u32 = 0;

/// Flag constants for the protocol.
pub mod flags {
    /// Direction: plugin to host (1) or host to plugin (0).
    pub const DIRECTION_TO_PARENT: u8 = 0b0000_0001;
    /// Message type: response (1) or request (0).
    pub const IS_RESPONSE: u8 = 0b0000_0010;
    /// Error flag: error (1) or ok (0).
    pub const IS_ERROR: u8 = 0b0000_0100;

    /// Reserved bits mask (bits 3-7).
    pub const RESERVED_MASK: u8 = 0b1111_1000;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }

    /// Call issued by the plugin.
    pub const REQUEST: u8 = DIRECTION_TO_PARENT;
    /// Successful reply from the host.
    pub const RESPONSE: u8 = IS_RESPONSE;
    /// Failed reply from the host.
    pub const ERROR_RESPONSE: u8 = IS_RESPONSE | IS_ERROR;
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Service method (see [`crate::message::method`]).
    pub method_id: u16,
    /// Flags byte (see `flags` module).
    pub flags: u8,
    /// Correlates a reply with its call.
    pub request_id: u32,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    pub fn new(method_id: u16, flags: u8, request_id: u32, payload_length: u32) -> Self {
        Self {
            method_id,
            flags,
            request_id,
            payload_length,
        }
    }

    /// Header of a call from the plugin.
    pub fn request(method_id: u16, request_id: u32, payload_length: u32) -> Self {
        Self::new(method_id, flags::REQUEST, request_id, payload_length)
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use procwire_responsewriter::protocol::{Header, flags};
    ///
    /// let header = Header::new(1, flags::RESPONSE, 42, 100);
    /// assert_eq!(header.encode().len(), 11);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..2].copy_from_slice(&self.method_id.to_be_bytes());
        buf[2] = self.flags;
        buf[3..7].copy_from_slice(&self.request_id.to_be_bytes());
        buf[7..11].copy_from_slice(&self.payload_length.to_be_bytes());
        buf
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            method_id: u16::from_be_bytes([buf[0], buf[1]]),
            flags: buf[2],
            request_id: u32::from_be_bytes([buf[3], buf[4], buf[5], buf[6]]),
            payload_length: u32::from_be_bytes([buf[7], buf[8], buf[9], buf[10]]),
        })
    }

    /// Validate the header for protocol compliance.
    ///
    /// Checks:
    /// - Method ID is not 0 (reserved)
    /// - Payload length doesn't exceed max
    /// - Reserved flag bits are 0
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.method_id == RESERVED_METHOD_ID {
            return Err(ResponseWriterError::Protocol(
                "Method ID 0 is reserved".to_string(),
            ));
        }

        if self.payload_length > max_payload_size {
            return Err(ResponseWriterError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }

        if self.flags & flags::RESERVED_MASK != 0 {
            return Err(ResponseWriterError::Protocol(
                "Reserved flag bits must be 0".to_string(),
            ));
        }

        Ok(())
    }

    #[inline]
    pub fn is_response(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_RESPONSE)
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_ERROR)
    }

    #[inline]
    pub fn is_to_parent(&self) -> bool {
        flags::has_flag(self.flags, flags::DIRECTION_TO_PARENT)
    }
}
