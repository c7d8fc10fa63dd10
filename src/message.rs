//! Request and reply messages of the response writer service.
//!
//! These are the MessagePack bodies carried in RPC frames. Every call has a
//! fixed method id (see [`method`]).

use serde::{Deserialize, Serialize};

use crate::header::HeaderMap;

/// Method ids of the response writer service.
pub mod method {
    /// Write body bytes.
    pub const WRITE: u16 = 1;
    /// Write status line and headers.
    pub const WRITE_HEADER: u16 = 2;
    /// Flush buffered body bytes.
    pub const FLUSH: u16 = 3;
    /// Take over the underlying connection.
    pub const HIJACK: u16 = 4;

    /// Human-readable method name, for logs.
    pub fn name(method_id: u16) -> &'static str {
        match method_id {
            WRITE => "write",
            WRITE_HEADER => "write_header",
            FLUSH => "flush",
            HIJACK => "hijack",
            _ => "unknown",
        }
    }
}

/// One header key with all of its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    pub values: Vec<String>,
}

/// Body bytes plus the header state at call time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub headers: Vec<Header>,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

impl WriteRequest {
    /// Build a request from a header snapshot and a payload.
    pub fn new(headers: &HeaderMap, payload: &[u8]) -> Self {
        Self {
            headers: headers.snapshot(),
            payload: payload.to_vec(),
        }
    }
}

/// Number of bytes the host wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub written: u32,
}

/// Status code plus the header state at call time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteHeaderRequest {
    pub headers: Vec<Header>,
    pub status_code: u16,
}

impl WriteHeaderRequest {
    /// Build a request from a header snapshot and a status code.
    pub fn new(headers: &HeaderMap, status_code: u16) -> Self {
        Self {
            headers: headers.snapshot(),
            status_code,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushRequest {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HijackRequest {}

/// Sub-connection ids and endpoint descriptions of a hijacked connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HijackResponse {
    /// Raw connection sub-connection.
    pub conn_server: u32,
    /// Reader stream sub-connection.
    pub reader_server: u32,
    /// Writer stream sub-connection.
    pub writer_server: u32,
    pub local_network: String,
    pub local_string: String,
    pub remote_network: String,
    pub remote_string: String,
}
