//! Codec module - JSON encoding/decoding for request bodies and control frames.
//!
//! - [`JsonCodec`] - plain byte-sequence encode/decode, no shared state
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects.
//! Nothing here holds decoder state across calls; the streaming decoder used
//! on a control channel lives in [`crate::protocol::PayloadDecoder`] and is
//! owned by exactly one process invocation.
//!
//! # Example
//!
//! ```
//! use garden_client::codec::JsonCodec;
//!
//! let encoded = JsonCodec::encode(&"hello").unwrap();
//! let decoded: String = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

mod json;

pub use json::JsonCodec;
