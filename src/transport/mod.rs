//! Transport module - dialing, routing and hijacking.
//!
//! Provides:
//! - [`Address`] / [`Stream`] - TCP or Unix Domain Socket connections
//! - [`routes`] - operation name → method + path template
//! - [`Hijacker`] - request upgraded into a raw duplex connection

mod hijack;
pub mod routes;
mod stream;

pub use hijack::{BoxedIo, HijackRequest, HijackedConnection, Hijacker, HttpHijacker, Io};
pub use routes::{Params, RequestGenerator};
pub use stream::{Address, Stream};
