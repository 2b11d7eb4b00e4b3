//! Process module - the caller-facing side of a run/attach invocation.
//!
//! - [`Process`] - handle with the process id and a once-resolved exit outcome
//! - [`ProcessIo`] - optional stdin source and stdout/stderr sinks
//! - `StreamHandler` - forwarding and completion tasks (crate-internal)

mod handle;
mod io;
pub(crate) mod stream_handler;

pub use handle::Process;
pub use io::{InputSource, OutputSink, ProcessIo};
