//! Forwarding and completion tasks for one process invocation.
//!
//! ```text
//! stdin source ──► stream_in ──► WriterHandle ──► control channel
//! Stdout conn  ──► stream_out ─► stdout sink
//! Stderr conn  ──► stream_out ─► stderr sink
//! control channel ──► wait ──► Process::exited
//! ```
//!
//! Every task selects on the invocation's teardown token. The first task to
//! reach an outcome resolves the [`Process`] and cancels the token, which
//! stops the others and drops every connection the invocation opened.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::handle::Process;
use super::io::{InputSource, OutputSink};
use crate::error::{GardenError, Result};
use crate::protocol::{PayloadDecoder, ProcessPayload};
use crate::transport::HijackedConnection;
use crate::writer::WriterHandle;

pub(crate) struct StreamHandler {
    process: Process,
    teardown: CancellationToken,
    copy_buffer_size: usize,
    outputs: Vec<JoinHandle<()>>,
}

impl StreamHandler {
    pub(crate) fn new(process: Process, teardown: CancellationToken, copy_buffer_size: usize) -> Self {
        Self {
            process,
            teardown,
            copy_buffer_size: copy_buffer_size.max(1),
            outputs: Vec::new(),
        }
    }

    /// Forward the caller's input as stdin frames, then one end-of-input frame.
    pub(crate) fn stream_in(&self, source: InputSource, writer: WriterHandle) {
        let pid = self.process.id();
        let teardown = self.teardown.clone();
        let chunk_size = self.copy_buffer_size;

        tokio::spawn(async move {
            tokio::select! {
                _ = teardown.cancelled() => {}
                result = copy_stdin(pid, source, &writer, chunk_size) => {
                    if let Err(e) = result {
                        tracing::error!("streaming stdin for process {} failed: {}", pid, e);
                    }
                }
            }
        });
    }

    /// Forward one side channel's raw bytes into the caller's sink.
    ///
    /// A read or write failure resolves the whole invocation with that error.
    pub(crate) fn stream_out(
        &mut self,
        stream: &'static str,
        conn: HijackedConnection,
        sink: OutputSink,
    ) {
        let process = self.process.clone();
        let teardown = self.teardown.clone();

        self.outputs.push(tokio::spawn(async move {
            tokio::select! {
                _ = teardown.cancelled() => {}
                result = copy_output(conn, sink) => {
                    if let Err(e) = result {
                        tracing::error!(
                            "{} stream for process {} failed: {}",
                            stream,
                            process.id(),
                            e
                        );
                        process.exited(Err(Arc::new(e)));
                        teardown.cancel();
                    }
                }
            }
        }));
    }

    /// Drain control frames until the process terminates, then resolve the
    /// handle and tear the invocation down.
    ///
    /// On a normal exit the already-open side channels are drained first so
    /// that all output reaches the sinks before waiters see the exit code.
    pub(crate) async fn wait<R>(self, mut decoder: PayloadDecoder<R>)
    where
        R: AsyncRead + Unpin,
    {
        let StreamHandler {
            process,
            teardown,
            outputs,
            ..
        } = self;

        let outcome = tokio::select! {
            biased;
            // Some other task already resolved the process.
            _ = teardown.cancelled() => None,
            result = read_terminal(&mut decoder) => Some(result),
        };

        match outcome {
            Some(Ok(code)) => {
                let drained = async {
                    for output in outputs {
                        let _ = output.await;
                    }
                };
                tokio::select! {
                    _ = teardown.cancelled() => {}
                    _ = drained => {}
                }
                process.exited(Ok(code));
            }
            Some(Err(e)) => {
                process.exited(Err(Arc::new(e)));
            }
            None => {}
        }

        teardown.cancel();
    }
}

/// Read control frames until one carries an exit status or an error.
async fn read_terminal<R>(decoder: &mut PayloadDecoder<R>) -> Result<i32>
where
    R: AsyncRead + Unpin,
{
    loop {
        let payload: ProcessPayload = decoder.decode().await?;
        match payload.terminal() {
            Some(outcome) => return outcome,
            None => tracing::trace!("ignoring non-terminal payload: {:?}", payload),
        }
    }
}

async fn copy_stdin(
    pid: u32,
    mut source: InputSource,
    writer: &WriterHandle,
    chunk_size: usize,
) -> Result<()> {
    let mut buf = vec![0u8; chunk_size];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let n = source.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        pending.extend_from_slice(&buf[..n]);
        let complete = complete_utf8_prefix(&pending);
        if complete == 0 {
            continue;
        }

        let data = String::from_utf8_lossy(&pending[..complete]).into_owned();
        pending.drain(..complete);
        writer.send(ProcessPayload::stdin(pid, data).encode()?).await?;
    }

    if !pending.is_empty() {
        let data = String::from_utf8_lossy(&pending).into_owned();
        writer.send(ProcessPayload::stdin(pid, data).encode()?).await?;
    }

    writer.send(ProcessPayload::stdin_eof(pid).encode()?).await
}

async fn copy_output(mut conn: HijackedConnection, mut sink: OutputSink) -> Result<()> {
    tokio::io::copy_buf(&mut conn, &mut sink).await?;
    sink.flush().await?;
    Ok(())
}

/// Length of `bytes` once a trailing, still incomplete UTF-8 sequence is
/// held back. Invalid bytes are not held back.
fn complete_utf8_prefix(bytes: &[u8]) -> usize {
    let floor = bytes.len().saturating_sub(3);
    for i in (floor..bytes.len()).rev() {
        let b = bytes[i];
        if b & 0xC0 == 0x80 {
            continue;
        }
        let width = match b {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if i + width > bytes.len() { i } else { bytes.len() };
    }
    bytes.len()
}
