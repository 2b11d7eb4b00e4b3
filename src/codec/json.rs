//! JSON codec using `serde_json`.
//!
//! Control frames are newline-terminated on the wire, matching what the
//! server's streaming encoder emits. Request bodies are not.

use bytes::Bytes;

use crate::error::Result;

/// JSON codec for request bodies, responses and control frames.
pub struct JsonCodec;

impl JsonCodec {
    /// Content type sent with JSON request bodies.
    pub const CONTENT_TYPE: &'static str = "application/json";

    /// Encode a value to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    /// Encode a value as one newline-terminated control frame.
    pub fn encode_frame<T: serde::Serialize + ?Sized>(value: &T) -> Result<Bytes> {
        let mut buf = serde_json::to_vec(value)?;
        buf.push(b'\n');
        Ok(Bytes::from(buf))
    }

    /// Decode JSON bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
