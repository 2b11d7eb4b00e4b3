//! Caller-facing handle to a running or attached remote process.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{GardenError, Result};
use crate::protocol::ProcessPayload;
use crate::types::{Signal, TtySpec};
use crate::writer::WriterHandle;

/// Resolved outcome of a process, shared by every waiter.
pub(crate) type Outcome = std::result::Result<i32, Arc<GardenError>>;

/// Handle to a remote process.
///
/// Cloning is cheap and every clone observes the same outcome. The outcome
/// is resolved exactly once by the invocation's completion task, whether or
/// not anyone is waiting.
#[derive(Clone)]
pub struct Process {
    inner: Arc<Inner>,
}

struct Inner {
    id: u32,
    outcome: watch::Sender<Option<Outcome>>,
    writer: WriterHandle,
}

impl Process {
    pub(crate) fn new(id: u32, writer: WriterHandle) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                id,
                outcome,
                writer,
            }),
        }
    }

    /// Process identifier assigned by the server (or supplied on attach).
    #[inline]
    pub fn id(&self) -> u32 {
        self.inner.id
    }

    /// Wait for the process to exit.
    ///
    /// Returns the exit code, or the error that terminated the invocation
    /// wrapped in [`GardenError::Exited`]. Safe to call any number of times
    /// from any number of tasks.
    pub async fn wait(&self) -> Result<i32> {
        let mut rx = self.inner.outcome.subscribe();
        // The sender lives in `inner`, so the channel cannot close under us.
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| GardenError::Disconnected)?
            .clone();

        match outcome {
            Some(Ok(code)) => Ok(code),
            Some(Err(e)) => Err(GardenError::Exited(e)),
            None => Err(GardenError::Disconnected),
        }
    }

    /// Outcome if already resolved, without waiting.
    pub fn try_wait(&self) -> Option<Result<i32>> {
        self.inner
            .outcome
            .borrow()
            .clone()
            .map(|outcome| outcome.map_err(GardenError::Exited))
    }

    /// Send a signal to the process over the control channel.
    pub async fn signal(&self, signal: Signal) -> Result<()> {
        let frame = ProcessPayload::signal(self.inner.id, signal).encode()?;
        self.inner.writer.send(frame).await
    }

    /// Update the process's TTY settings (e.g. after a terminal resize).
    pub async fn set_tty(&self, tty: TtySpec) -> Result<()> {
        let frame = ProcessPayload::tty(self.inner.id, tty).encode()?;
        self.inner.writer.send(frame).await
    }

    /// Resolve the outcome. Only the first call has any effect; returns
    /// whether this call was the one that resolved it.
    pub(crate) fn exited(&self, outcome: Outcome) -> bool {
        let id = self.inner.id;
        self.inner.outcome.send_if_modified(|slot| {
            if slot.is_some() {
                tracing::trace!("process {} already resolved, ignoring", id);
                return false;
            }
            match &outcome {
                Ok(code) => tracing::debug!("process {} exited with status {}", id, code),
                Err(e) => tracing::debug!("process {} terminated: {}", id, e),
            }
            *slot = Some(outcome);
            true
        })
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.inner.id)
            .field("resolved", &self.inner.outcome.borrow().is_some())
            .finish()
    }
}
