//! Streaming JSON decoder for a control channel.
//!
//! Uses `bytes::BytesMut` to accumulate partial reads and pulls one JSON
//! value at a time out of the buffer:
//! - a complete value is returned and its bytes consumed
//! - a truncated value waits for more bytes
//! - anything else is a protocol error
//!
//! One decoder is bound to one connection for the lifetime of an
//! invocation, so bytes that arrive together with the identifying payload
//! are still there when the terminal frame is read.
//!
//! # Example
//!
//! ```ignore
//! use garden_client::protocol::{PayloadDecoder, ProcessPayload};
//!
//! let mut decoder = PayloadDecoder::new(reader);
//! let first: ProcessPayload = decoder.decode().await?;
//! ```

use bytes::{Buf, BytesMut};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{GardenError, Result};

/// Default upper bound on a single buffered payload (16 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

const READ_CHUNK: usize = 8 * 1024;

/// Decoder reading successive JSON values from one byte stream.
pub struct PayloadDecoder<R> {
    reader: R,
    /// Bytes read from the connection but not yet decoded.
    buffer: BytesMut,
    max_payload_size: usize,
}

impl<R: AsyncRead + Unpin> PayloadDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max_payload(reader, DEFAULT_MAX_PAYLOAD_SIZE)
    }

    pub fn with_max_payload(reader: R, max_payload_size: usize) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            max_payload_size,
        }
    }

    /// Read the next JSON value.
    ///
    /// # Errors
    ///
    /// - [`GardenError::Json`] if the bytes are not valid JSON for `T`
    /// - [`GardenError::Protocol`] if a value exceeds the size limit or the
    ///   connection closes in the middle of one
    /// - [`GardenError::Disconnected`] if the connection closes between values
    /// - [`GardenError::Io`] on read failure
    pub async fn decode<T: DeserializeOwned>(&mut self) -> Result<T> {
        loop {
            if let Some(value) = self.try_extract_one()? {
                return Ok(value);
            }

            if self.buffer.len() > self.max_payload_size {
                return Err(GardenError::Protocol(format!(
                    "payload size exceeds maximum {}",
                    self.max_payload_size
                )));
            }

            self.buffer.reserve(READ_CHUNK);
            let n = self.reader.read_buf(&mut self.buffer).await?;
            if n == 0 {
                return Err(if self.buffer.is_empty() {
                    GardenError::Disconnected
                } else {
                    GardenError::Protocol("connection closed mid-payload".into())
                });
            }
        }
    }

    /// Try to decode a single value from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(value))` if a complete value was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` if the buffered bytes can never form a value
    fn try_extract_one<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        let leading = self
            .buffer
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        self.buffer.advance(leading);

        if self.buffer.is_empty() {
            return Ok(None);
        }

        let (value, consumed) = {
            let mut values = serde_json::Deserializer::from_slice(&self.buffer).into_iter::<T>();
            match values.next() {
                Some(Ok(value)) => (value, values.byte_offset()),
                Some(Err(e)) if e.is_eof() => return Ok(None),
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        };

        self.buffer.advance(consumed);
        Ok(Some(value))
    }

    /// Number of bytes read but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Give back the underlying reader, dropping any undecoded bytes.
    pub fn into_inner(self) -> R {
        self.reader
    }
}
