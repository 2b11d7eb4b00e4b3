//! Protocol module - control-channel payloads and their streaming decoder.
//!
//! A hijacked control channel carries a sequence of JSON objects:
//! 1. one identifying payload (`process_id`, `stream_id`) from the server
//! 2. any number of outbound stdin / signal / tty frames from the client
//! 3. exactly one terminal frame (`exit_status` or `error`) from the server
//!
//! Side channels (stdout/stderr) carry raw bytes and are not framed at all.

mod decoder;
mod payload;

pub use decoder::{PayloadDecoder, DEFAULT_MAX_PAYLOAD_SIZE};
pub use payload::{ProcessPayload, StreamIdentity, StreamSource};
