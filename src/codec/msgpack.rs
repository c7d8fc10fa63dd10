//! MsgPack codec using `rmp-serde`.
//!
//! Structs are always encoded with `to_vec_named` (struct-as-map), so the
//! host can decode messages by field name regardless of field order.

use crate::error::Result;

/// MessagePack codec for RPC messages.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes (struct-as-map format).
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Header, HijackResponse, WriteRequest};

    #[test]
    fn test_structs_encode_as_maps() {
        let req = WriteRequest {
            headers: vec![],
            payload: b"x".to_vec(),
        };
        let encoded = MsgPackCodec::encode(&req).unwrap();

        // fixmap with 2 entries, not fixarray
        assert_eq!(encoded[0], 0x82, "Expected fixmap, got {:02X}", encoded[0]);
    }

    #[test]
    fn test_payload_encodes_as_binary() {
        let req = WriteRequest {
            headers: vec![],
            payload: vec![1, 2, 3],
        };
        let encoded = MsgPackCodec::encode(&req).unwrap();

        // bin8 marker followed by length 3 must appear, not an array of ints
        assert!(encoded.windows(2).any(|w| w == [0xc4, 0x03]));
    }

    #[test]
    fn test_hijack_response_decode() {
        let resp = HijackResponse {
            conn_server: 1,
            reader_server: 2,
            writer_server: 3,
            local_network: "tcp".to_string(),
            local_string: "127.0.0.1:9".to_string(),
            remote_network: "tcp".to_string(),
            remote_string: "10.0.0.1:9".to_string(),
        };
        let encoded = MsgPackCodec::encode(&resp).unwrap();
        let decoded: HijackResponse = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, resp);
    }

    #[test]
    fn test_header_values_keep_order() {
        let header = Header {
            key: "Accept".to_string(),
            values: vec!["b".to_string(), "a".to_string(), "c".to_string()],
        };
        let decoded: Header = MsgPackCodec::decode(&MsgPackCodec::encode(&header).unwrap()).unwrap();
        assert_eq!(decoded.values, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let result: Result<HijackResponse> = MsgPackCodec::decode(b"not valid msgpack");
        assert!(result.is_err());
    }
}
