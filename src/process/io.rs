use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite};

/// Boxed input source for a process's stdin.
pub type InputSource = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed sink for a process's stdout or stderr.
pub type OutputSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Caller-supplied standard streams for `run` / `attach`.
///
/// Each stream is optional. A side channel is only opened for an output
/// stream that is present, and stdin frames are only sent if a source is.
#[derive(Default)]
pub struct ProcessIo {
    pub stdin: Option<InputSource>,
    pub stdout: Option<OutputSink>,
    pub stderr: Option<OutputSink>,
}

impl ProcessIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdin(mut self, source: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.stdin = Some(Box::new(source));
        self
    }

    pub fn stdout(mut self, sink: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stdout = Some(Box::new(sink));
        self
    }

    pub fn stderr(mut self, sink: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stderr = Some(Box::new(sink));
        self
    }
}

impl fmt::Debug for ProcessIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessIo")
            .field("stdin", &self.stdin.is_some())
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .finish()
    }
}
