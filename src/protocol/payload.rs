//! Control-channel payload record.
//!
//! Every frame in either direction is the same record with most fields
//! absent:
//!
//! ```text
//! server → client   {"process_id":42,"stream_id":7}          identifying payload
//! client → server   {"process_id":42,"source":0,"data":"ls\n"} stdin chunk
//! client → server   {"process_id":42,"source":0}             end of stdin
//! client → server   {"process_id":42,"signal":1}             signal
//! server → client   {"process_id":42,"exit_status":0}        terminal frame
//! ```

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};

use crate::codec::JsonCodec;
use crate::error::{GardenError, Result};
use crate::types::{int_enum, Signal, TtySpec};

int_enum! {
    /// Which standard stream a payload belongs to.
    pub enum StreamSource {
        Stdin = 0,
        Stdout = 1,
        Stderr = 2,
    }
}

/// A single control-channel frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessPayload {
    #[serde(skip_serializing_if = "is_zero", deserialize_with = "null_as_zero")]
    pub process_id: u32,
    #[serde(skip_serializing_if = "is_zero", deserialize_with = "null_as_zero")]
    pub stream_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<StreamSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tty: Option<TtySpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

fn null_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or_default())
}

impl ProcessPayload {
    /// Stdin data chunk.
    pub fn stdin(process_id: u32, data: String) -> Self {
        Self {
            process_id,
            source: Some(StreamSource::Stdin),
            data: Some(data),
            ..Self::default()
        }
    }

    /// End-of-input marker: stdin source with no data.
    pub fn stdin_eof(process_id: u32) -> Self {
        Self {
            process_id,
            source: Some(StreamSource::Stdin),
            ..Self::default()
        }
    }

    pub fn signal(process_id: u32, signal: Signal) -> Self {
        Self {
            process_id,
            signal: Some(signal),
            ..Self::default()
        }
    }

    pub fn tty(process_id: u32, tty: TtySpec) -> Self {
        Self {
            process_id,
            tty: Some(tty),
            ..Self::default()
        }
    }

    /// Outcome carried by a terminal frame, or `None` for any other frame.
    ///
    /// An `error` field wins over `exit_status` when both are present. A
    /// negative exit status is a protocol error.
    pub fn terminal(&self) -> Option<Result<i32>> {
        if let Some(message) = &self.error {
            return Some(Err(GardenError::ProcessFailed(message.clone())));
        }
        self.exit_status.map(|code| {
            if code < 0 {
                Err(GardenError::Protocol(format!("negative exit status {}", code)))
            } else {
                Ok(code)
            }
        })
    }

    /// Encode as a newline-terminated wire frame.
    pub fn encode(&self) -> Result<Bytes> {
        JsonCodec::encode_frame(self)
    }
}

/// Identity of one run/attach invocation, decoded from the first control payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamIdentity {
    pub process_id: u32,
    pub stream_id: u32,
}

impl From<&ProcessPayload> for StreamIdentity {
    fn from(payload: &ProcessPayload) -> Self {
        Self {
            process_id: payload.process_id,
            stream_id: payload.stream_id,
        }
    }
}
