//! Setting up a process invocation on a freshly hijacked control channel.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::ConnectionConfig;
use crate::codec::JsonCodec;
use crate::error::{GardenError, Result};
use crate::process::stream_handler::StreamHandler;
use crate::process::{Process, ProcessIo};
use crate::protocol::{PayloadDecoder, ProcessPayload, StreamIdentity};
use crate::transport::routes;
use crate::transport::{HijackRequest, HijackedConnection, Hijacker};
use crate::writer::spawn_writer_task;

/// Drive a run/attach invocation from its control channel.
///
/// Returns as soon as the identifying payload is decoded and the requested
/// side channels are open. A failure to decode the identifying payload is
/// returned here; a side channel that fails to open yields a [`Process`]
/// that is already resolved to [`GardenError::StreamHijack`].
pub(crate) async fn stream_process<H: Hijacker>(
    hijacker: &H,
    handle: &str,
    control: HijackedConnection,
    io: ProcessIo,
    config: &ConnectionConfig,
) -> Result<Process> {
    let (read_half, write_half) = tokio::io::split(control);

    // The same decoder reads the terminal frame later, so nothing buffered
    // behind the identifying payload is lost.
    let mut decoder = PayloadDecoder::with_max_payload(read_half, config.max_payload_size);
    let first: ProcessPayload = decoder.decode().await?;
    let identity = StreamIdentity::from(&first);
    tracing::debug!(
        "control channel open for process {} (stream {}) in {}",
        identity.process_id,
        identity.stream_id,
        handle
    );

    let teardown = CancellationToken::new();
    let (writer, _writer_task) =
        spawn_writer_task(write_half, config.writer.clone(), teardown.clone());
    let process = Process::new(identity.process_id, writer.clone());
    let mut handler = StreamHandler::new(process.clone(), teardown.clone(), config.copy_buffer_size);

    let ProcessIo {
        stdin,
        stdout,
        stderr,
    } = io;

    if let Some(stdin) = stdin {
        handler.stream_in(stdin, writer);
    }

    let pid = identity.process_id.to_string();
    let stream_id = identity.stream_id.to_string();
    let params = [
        ("handle", handle),
        ("pid", pid.as_str()),
        ("streamid", stream_id.as_str()),
    ];

    for (stream, sink) in [(routes::STDOUT, stdout), (routes::STDERR, stderr)] {
        let Some(sink) = sink else {
            continue;
        };

        let request = HijackRequest::new(stream, &params).content_type(JsonCodec::CONTENT_TYPE);
        match hijacker.hijack(request).await {
            Ok(conn) => handler.stream_out(stream, conn, sink),
            Err(e) => {
                tracing::error!(
                    "failed to hijack stream {} for process {}: {}",
                    stream,
                    identity.process_id,
                    e
                );
                process.exited(Err(Arc::new(GardenError::StreamHijack {
                    stream,
                    source: Box::new(e),
                })));
                teardown.cancel();
                return Ok(process);
            }
        }
    }

    tokio::spawn(handler.wait(decoder));
    Ok(process)
}
