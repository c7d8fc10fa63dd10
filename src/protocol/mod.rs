//! Protocol module - wire format and framing of RPC calls to the host.
//!
//! - 11-byte header encoding/decoding
//! - Frame buffer reassembling replies from partial reads
//! - Frame struct with typed accessors

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    flags, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, RESERVED_METHOD_ID, RESERVED_REQUEST_ID,
};
