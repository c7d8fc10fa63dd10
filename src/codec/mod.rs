//! Codec module - serialization of RPC message payloads.
//!
//! All request and reply bodies exchanged with the host are MessagePack,
//! encoded through [`MsgPackCodec`].
//!
//! # Example
//!
//! ```
//! use procwire_responsewriter::codec::MsgPackCodec;
//!
//! let encoded = MsgPackCodec::encode(&"hello").unwrap();
//! let decoded: String = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

mod msgpack;

pub use msgpack::MsgPackCodec;
