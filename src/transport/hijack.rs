//! Hijacking: turning one HTTP request into a caller-owned duplex connection.
//!
//! The server answers a streaming request with a normal response head and
//! then keeps the socket open as a raw byte stream. The hijacker writes the
//! request, reads the head itself, and hands back the socket wrapped in a
//! buffered reader positioned at the first byte after the head.

use std::future::Future;

use bytes::Bytes;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST, TRANSFER_ENCODING};
use hyper::StatusCode;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::routes::{Params, RequestGenerator};
use super::Address;
use crate::error::{GardenError, Result};

/// Upper bound on a response head read by the hijacker.
const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Upper bound on an error body read after a refused hijack.
const MAX_ERROR_BODY_SIZE: u64 = 1024 * 1024;

/// Any full-duplex byte stream.
pub trait Io: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Io for T {}

/// Type-erased duplex stream.
pub type BoxedIo = Box<dyn Io>;

/// A hijacked connection. Reads go through the buffer, writes pass straight through.
pub type HijackedConnection = BufReader<BoxedIo>;

/// A streaming request to hijack.
#[derive(Debug, Clone, Copy)]
pub struct HijackRequest<'a> {
    pub route: &'static str,
    pub params: Params<'a>,
    pub query: Params<'a>,
    pub body: Option<&'a Bytes>,
    pub content_type: Option<&'static str>,
}

impl<'a> HijackRequest<'a> {
    pub fn new(route: &'static str, params: Params<'a>) -> Self {
        Self {
            route,
            params,
            query: &[],
            body: None,
            content_type: None,
        }
    }

    pub fn body(mut self, body: &'a Bytes, content_type: &'static str) -> Self {
        self.body = Some(body);
        self.content_type = Some(content_type);
        self
    }

    pub fn content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = Some(content_type);
        self
    }
}

/// Upgrades a request into a raw duplex connection.
///
/// On success, ownership of the connection moves entirely to the caller.
/// On failure, no connection is returned.
pub trait Hijacker: Send + Sync + 'static {
    fn hijack(
        &self,
        request: HijackRequest<'_>,
    ) -> impl Future<Output = Result<HijackedConnection>> + Send;
}

/// Hijacker that dials the server for every request.
#[derive(Debug, Clone)]
pub struct HttpHijacker {
    address: Address,
    generator: RequestGenerator,
}

impl HttpHijacker {
    pub fn new(address: Address) -> Result<Self> {
        Ok(Self {
            address,
            generator: RequestGenerator::new()?,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }
}

impl Hijacker for HttpHijacker {
    async fn hijack(&self, request: HijackRequest<'_>) -> Result<HijackedConnection> {
        let (method, target) =
            self.generator
                .request_target(request.route, request.params, request.query)?;

        let mut head = format!(
            "{} {} HTTP/1.1\r\n{}: {}\r\n",
            method,
            target,
            HOST,
            RequestGenerator::HOST
        );
        if let Some(content_type) = request.content_type {
            head.push_str(&format!("{}: {}\r\n", CONTENT_TYPE, content_type));
        }
        if let Some(body) = request.body {
            head.push_str(&format!("{}: {}\r\n", CONTENT_LENGTH, body.len()));
        }
        head.push_str("\r\n");

        let mut stream = self.address.connect().await?;
        stream.write_all(head.as_bytes()).await?;
        if let Some(body) = request.body {
            stream.write_all(body).await?;
        }
        stream.flush().await?;

        let mut conn: HijackedConnection = BufReader::new(Box::new(stream));
        let response = read_response_head(&mut conn).await?;

        if !response.status.is_success() {
            tracing::debug!(
                "hijack of {} refused with status {}",
                request.route,
                response.status
            );
            let body = read_error_body(&mut conn, &response).await?;
            return Err(GardenError::from_status(response.status.as_u16(), &body));
        }

        Ok(conn)
    }
}

/// Parsed status line and the headers the hijacker cares about.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ResponseHead {
    pub status: StatusCode,
    pub content_length: Option<u64>,
    pub chunked: bool,
}

/// Read an HTTP/1.x response head, leaving the reader at the first body byte.
pub(crate) async fn read_response_head<R>(reader: &mut R) -> Result<ResponseHead>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut line = String::new();
    let mut consumed = 0usize;

    consumed += read_head_line(reader, &mut line).await?;
    let mut parts = line.split_whitespace();
    let status = match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/1.") => {
            StatusCode::from_bytes(code.as_bytes())
                .map_err(|_| GardenError::Protocol(format!("bad status line: {}", line.trim())))?
        }
        _ => {
            return Err(GardenError::Protocol(format!(
                "bad status line: {}",
                line.trim()
            )))
        }
    };

    let mut content_length = None;
    let mut chunked = false;
    loop {
        line.clear();
        consumed += read_head_line(reader, &mut line).await?;
        if consumed > MAX_HEAD_SIZE {
            return Err(GardenError::Protocol("response head too large".into()));
        }

        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            break;
        }

        if let Some((name, value)) = header.split_once(':') {
            let name = name.trim();
            if name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str()) {
                content_length = value.trim().parse().ok();
            } else if name.eq_ignore_ascii_case(TRANSFER_ENCODING.as_str()) {
                chunked = value
                    .rsplit(',')
                    .next()
                    .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"));
            }
        }
    }

    Ok(ResponseHead {
        status,
        content_length,
        chunked,
    })
}

/// Read the body of a refused hijack, following the head's framing.
///
/// Chunked encoding takes precedence over `Content-Length`; with neither, the
/// body runs until the server closes the connection. At most
/// `MAX_ERROR_BODY_SIZE` bytes are kept.
async fn read_error_body<R>(reader: &mut R, head: &ResponseHead) -> Result<Vec<u8>>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut body = Vec::new();
    if head.chunked {
        read_chunked_body(reader, &mut body).await?;
        return Ok(body);
    }

    let limit = head
        .content_length
        .unwrap_or(MAX_ERROR_BODY_SIZE)
        .min(MAX_ERROR_BODY_SIZE);
    (&mut *reader).take(limit).read_to_end(&mut body).await?;
    Ok(body)
}

async fn read_chunked_body<R>(reader: &mut R, body: &mut Vec<u8>) -> Result<()>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        read_chunk_line(reader, &mut line).await?;
        let size = line
            .split(';')
            .next()
            .map(str::trim)
            .and_then(|size| u64::from_str_radix(size, 16).ok())
            .ok_or_else(|| GardenError::Protocol(format!("bad chunk size: {}", line.trim())))?;
        if size == 0 {
            // Trailers are not needed for an error message.
            return Ok(());
        }

        let room = MAX_ERROR_BODY_SIZE.saturating_sub(body.len() as u64);
        if size > room {
            return Err(GardenError::Protocol("error body too large".into()));
        }

        let start = body.len();
        (&mut *reader).take(size).read_to_end(body).await?;
        if ((body.len() - start) as u64) < size {
            return Err(GardenError::Protocol("connection closed mid-chunk".into()));
        }

        line.clear();
        read_chunk_line(reader, &mut line).await?;
    }
}

async fn read_chunk_line<R>(reader: &mut R, line: &mut String) -> Result<()>
where
    R: AsyncBufReadExt + Unpin,
{
    if reader.read_line(line).await? == 0 {
        return Err(GardenError::Protocol("connection closed mid-chunk".into()));
    }
    Ok(())
}

async fn read_head_line<R>(reader: &mut R, line: &mut String) -> Result<usize>
where
    R: AsyncBufReadExt + Unpin,
{
    let n = reader.read_line(line).await?;
    if n == 0 {
        return Err(GardenError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed before response head",
        )));
    }
    Ok(n)
}
