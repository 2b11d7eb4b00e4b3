//! Test utilities for garden-client integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use garden_client::transport::{routes, BoxedIo, HijackRequest, HijackedConnection, Hijacker};
use garden_client::{Address, GardenError, Result};
use tokio::io::{
    duplex, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
    DuplexStream, ReadBuf,
};
use tokio::net::{TcpListener, TcpStream};

// ---------------------------------------------------------------------------
// Fake garden server over loopback TCP
// ---------------------------------------------------------------------------

/// A request as seen by the fake server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Origin-form target, e.g. `/containers/web-1/info?x=1`.
    pub target: String,
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or("")
    }

    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, q)| q)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

pub type HijackScript = Box<dyn FnOnce(BufReader<TcpStream>) -> BoxFuture<'static, ()> + Send>;

/// What the fake server does with a request.
pub enum Reply {
    /// Plain response with a body, then close.
    Status(u16, Vec<u8>),
    /// 200 response head, then hand the socket to a script.
    Hijack(HijackScript),
}

impl Reply {
    pub fn json(body: &str) -> Self {
        Reply::Status(200, body.as_bytes().to_vec())
    }

    pub fn status(status: u16, body: &str) -> Self {
        Reply::Status(status, body.as_bytes().to_vec())
    }

    pub fn hijack<F, Fut>(script: F) -> Self
    where
        F: FnOnce(BufReader<TcpStream>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        Reply::Hijack(Box::new(move |conn| -> BoxFuture<'static, ()> {
            Box::pin(script(conn))
        }))
    }
}

type Handler = Arc<dyn Fn(&RecordedRequest) -> Reply + Send + Sync>;

/// Minimal HTTP/1.1 server standing in for garden.
pub struct FakeServer {
    pub address: Address,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = Address::Tcp(listener.local_addr().unwrap().to_string());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Handler = Arc::new(handler);

        let recorded = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let handler = handler.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    serve_connection(socket, handler, recorded).await;
                });
            }
        });

        Self { address, requests }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

async fn serve_connection(
    socket: TcpStream,
    handler: Handler,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
) {
    let mut conn = BufReader::new(socket);
    let Some(request) = read_request(&mut conn).await else {
        return;
    };
    recorded.lock().unwrap().push(request.clone());

    match handler(&request) {
        Reply::Status(status, body) => {
            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                reason(status),
                body.len()
            );
            let socket = conn.get_mut();
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;
        }
        Reply::Hijack(script) => {
            let _ = conn.get_mut().write_all(b"HTTP/1.1 200 OK\r\n\r\n").await;
            script(conn).await;
        }
    }
}

async fn read_request(conn: &mut BufReader<TcpStream>) -> Option<RecordedRequest> {
    let mut line = String::new();
    if conn.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = HashMap::new();
    loop {
        line.clear();
        conn.read_line(&mut line).await.ok()?;
        let header = line.trim_end();
        if header.is_empty() {
            break;
        }
        let (name, value) = header.split_once(':')?;
        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    let mut body = Vec::new();
    if let Some(len) = headers.get("content-length") {
        let len: usize = len.parse().ok()?;
        body.resize(len, 0);
        conn.read_exact(&mut body).await.ok()?;
    } else if headers
        .get("transfer-encoding")
        .is_some_and(|te| te.eq_ignore_ascii_case("chunked"))
    {
        loop {
            line.clear();
            conn.read_line(&mut line).await.ok()?;
            let size = usize::from_str_radix(line.trim(), 16).ok()?;
            let mut chunk = vec![0u8; size + 2];
            conn.read_exact(&mut chunk).await.ok()?;
            if size == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..size]);
        }
    }

    Some(RecordedRequest {
        method,
        target,
        headers,
        body,
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

// ---------------------------------------------------------------------------
// Scripted hijacker over in-memory pipes
// ---------------------------------------------------------------------------

/// One hijack call as seen by [`FakeHijacker`].
#[derive(Debug, Clone)]
pub struct HijackCall {
    pub route: String,
    pub params: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub body: Option<Vec<u8>>,
    /// False if the hijack was refused.
    pub accepted: bool,
}

impl HijackCall {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

enum Scripted {
    Conn(DuplexStream),
    Broken,
    Fail(u16, String),
}

/// Hijacker that hands out pre-arranged in-memory connections per route.
///
/// Clones share their scripts and call log, so a test can keep one clone
/// while the connection under test owns another.
#[derive(Clone, Default)]
pub struct FakeHijacker {
    shared: Arc<Scripts>,
}

#[derive(Default)]
struct Scripts {
    queued: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<HijackCall>>,
}

impl FakeHijacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a connection for `route`; returns the server end.
    pub fn channel(&self, route: &str) -> DuplexStream {
        let (client, server) = duplex(64 * 1024);
        self.push(route, Scripted::Conn(client));
        server
    }

    /// Queue a connection for `route` whose reads fail with a reset.
    pub fn broken(&self, route: &str) {
        self.push(route, Scripted::Broken);
    }

    /// Queue a refused hijack for `route`.
    pub fn fail(&self, route: &str, status: u16, message: &str) {
        self.push(route, Scripted::Fail(status, message.to_string()));
    }

    pub fn calls(&self) -> Vec<HijackCall> {
        self.shared.calls.lock().unwrap().clone()
    }

    /// Number of connections successfully handed out.
    pub fn opened(&self) -> usize {
        self.shared
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.accepted)
            .count()
    }

    fn push(&self, route: &str, scripted: Scripted) {
        self.shared
            .queued
            .lock()
            .unwrap()
            .entry(route.to_string())
            .or_default()
            .push_back(scripted);
    }
}

impl Hijacker for FakeHijacker {
    async fn hijack(&self, request: HijackRequest<'_>) -> Result<HijackedConnection> {
        let scripted = self
            .shared
            .queued
            .lock()
            .unwrap()
            .get_mut(request.route)
            .and_then(VecDeque::pop_front);

        let call = HijackCall {
            route: request.route.to_string(),
            params: request
                .params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            content_type: request.content_type.map(str::to_string),
            body: request.body.map(|b| b.to_vec()),
            accepted: true,
        };

        let io: BoxedIo = match scripted {
            Some(Scripted::Conn(conn)) => Box::new(conn),
            Some(Scripted::Broken) => Box::new(ResetConn),
            Some(Scripted::Fail(status, message)) => {
                self.shared.calls.lock().unwrap().push(HijackCall {
                    accepted: false,
                    ..call
                });
                return Err(if status == 503 {
                    GardenError::ServiceUnavailable(message)
                } else {
                    GardenError::Operation { status, message }
                });
            }
            None => {
                return Err(GardenError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    format!("no script for {}", request.route),
                )))
            }
        };

        self.shared.calls.lock().unwrap().push(call);
        Ok(BufReader::new(io))
    }
}

/// Connection whose reads fail, as after an abrupt close by the peer.
pub struct ResetConn;

impl AsyncRead for ResetConn {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Poll::Ready(Err(std::io::ErrorKind::ConnectionReset.into()))
    }
}

impl AsyncWrite for ResetConn {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

// ---------------------------------------------------------------------------
// Sinks and control-channel helpers
// ---------------------------------------------------------------------------

/// Clonable in-memory sink for stdout/stderr.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Server end of a control channel.
pub struct ControlPeer<S> {
    lines: tokio::io::Lines<BufReader<tokio::io::ReadHalf<S>>>,
    writer: tokio::io::WriteHalf<S>,
}

impl<S: AsyncRead + AsyncWrite> ControlPeer<S> {
    pub fn new(stream: S) -> Self {
        let (read, writer) = tokio::io::split(stream);
        Self {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    pub async fn send(&mut self, json: &str) {
        self.writer.write_all(json.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Next frame from the client, or `None` once it has closed the channel.
    pub async fn recv(&mut self) -> Option<serde_json::Value> {
        let line = self.lines.next_line().await.ok()??;
        Some(serde_json::from_str(&line).unwrap())
    }
}

/// Route names re-exported for brevity in tests.
pub use routes::{ATTACH, RUN, STDERR, STDOUT};
