//! Dedicated writer task for the control channel.
//!
//! Stdin forwarding, signals and TTY updates all produce frames for the same
//! connection. Instead of sharing the write half behind a lock, each producer
//! holds a [`WriterHandle`] and a single task owns the write half:
//!
//! ```text
//! stdin forwarder ─┐
//! Process::signal ─┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► control channel
//! Process::set_tty ┘
//! ```
//!
//! Frames from one producer reach the wire in the order they were sent.
//! The task stops when every handle is dropped or the shutdown token fires.
//! A cancelled task drops the write half even if a write is still blocked;
//! otherwise it shuts the write half down on the way out.

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{GardenError, Result};

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 32;

/// An encoded, newline-terminated frame ready to be written.
#[derive(Debug, Clone)]
pub struct OutboundFrame(pub Bytes);

impl OutboundFrame {
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Bytes> for OutboundFrame {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Frames that may queue before `send` waits.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for sending frames to the writer task.
///
/// Cheaply cloneable. Once the task has stopped, `send` fails with
/// [`GardenError::Disconnected`].
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame, waiting for channel capacity if needed.
    pub async fn send(&self, frame: impl Into<OutboundFrame>) -> Result<()> {
        self.tx
            .send(frame.into())
            .await
            .map_err(|_| GardenError::Disconnected)
    }

    /// True once the writer task has stopped accepting frames.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The returned `JoinHandle` resolves once the write half has been shut down.
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
    shutdown: CancellationToken,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let task = tokio::spawn(writer_loop(rx, writer, shutdown));
    (WriterHandle { tx }, task)
}

async fn writer_loop<W>(
    mut rx: mpsc::Receiver<OutboundFrame>,
    mut writer: W,
    shutdown: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let result = loop {
        let first = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break Ok(()),
            frame = rx.recv() => match frame {
                Some(f) => f,
                None => break Ok(()),
            },
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        // A peer that stops reading must not keep the write half alive.
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break Ok(()),
            written = write_batch(&mut writer, &batch) => {
                if let Err(e) = written {
                    tracing::debug!("control channel write failed: {}", e);
                    break Err(e);
                }
            }
        }
    };

    rx.close();
    if !shutdown.is_cancelled() {
        let _ = writer.shutdown().await;
    }
    result
}

/// Write a batch of frames with scatter/gather I/O, then flush.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(OutboundFrame::len).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(GardenError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Slices covering everything after the first `skip_bytes` bytes of the batch.
fn remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len());
    let mut offset = 0;

    for frame in batch {
        let end = offset + frame.len();
        if skip_bytes < end && !frame.is_empty() {
            let start = skip_bytes.saturating_sub(offset);
            slices.push(IoSlice::new(&frame.0[start..]));
        }
        offset = end;
    }

    slices
}
