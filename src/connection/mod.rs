//! Connection module - the typed wire API of a garden server.
//!
//! A [`Connection`] turns each operation into one request:
//! - unary operations go through the executor (JSON in, JSON out)
//! - `stream_in` / `stream_out` move raw tar bytes
//! - `run` / `attach` hijack a control channel and hand back a [`Process`]
//!
//! # Example
//!
//! ```ignore
//! use garden_client::{Address, Connection, ProcessIo, ProcessSpec};
//!
//! let conn = Connection::new(Address::parse("tcp", "127.0.0.1:7777")?)?;
//! let process = conn
//!     .run("web-1", &ProcessSpec::new("ls", ["-l"]), ProcessIo::new().stdout(tokio::io::stdout()))
//!     .await?;
//! let code = process.wait().await?;
//! ```

mod executor;
mod streaming;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::codec::JsonCodec;
use crate::error::Result;
use crate::process::{Process, ProcessIo};
use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;
use crate::transport::routes;
use crate::transport::{Address, HijackRequest, Hijacker, HttpHijacker, RequestGenerator};
use crate::types::{
    BandwidthLimits, Capacity, ContainerInfo, ContainerInfoEntry, ContainerMetricsEntry,
    ContainerSpec, CpuLimits, DiskLimits, MemoryLimits, Metrics, NetOutRule, ProcessSpec,
    Properties,
};
use crate::writer::WriterConfig;

use executor::{reader_body, Executor};

pub use executor::ResponseReader;

/// Default read size when forwarding stdin (32 KiB).
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 32 * 1024;

/// Content type of `stream_in` bodies.
const TAR_CONTENT_TYPE: &str = "application/x-tar";

/// Per-connection tuning.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Control-channel writer settings.
    pub writer: WriterConfig,
    /// Read size used when forwarding stdin.
    pub copy_buffer_size: usize,
    /// Upper bound on one control payload.
    pub max_payload_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            writer: WriterConfig::default(),
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

/// Typed access to one garden server.
///
/// Holds no open sockets between calls: every operation dials its own.
pub struct Connection<H = HttpHijacker> {
    executor: Executor,
    hijacker: Arc<H>,
    config: ConnectionConfig,
}

impl<H> Clone for Connection<H> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            hijacker: self.hijacker.clone(),
            config: self.config.clone(),
        }
    }
}

impl<H> std::fmt::Debug for Connection<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", self.executor.address())
            .field("config", &self.config)
            .finish()
    }
}

impl Connection<HttpHijacker> {
    pub fn new(address: Address) -> Result<Self> {
        Self::with_config(address, ConnectionConfig::default())
    }

    pub fn with_config(address: Address, config: ConnectionConfig) -> Result<Self> {
        let hijacker = HttpHijacker::new(address.clone())?;
        Self::with_hijacker(address, hijacker, config)
    }
}

impl<H: Hijacker> Connection<H> {
    /// Build a connection that opens streaming channels through `hijacker`.
    pub fn with_hijacker(address: Address, hijacker: H, config: ConnectionConfig) -> Result<Self> {
        Ok(Self {
            executor: Executor::new(address, RequestGenerator::new()?),
            hijacker: Arc::new(hijacker),
            config,
        })
    }

    pub fn address(&self) -> &Address {
        self.executor.address()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub async fn ping(&self) -> Result<()> {
        self.executor
            .call_unit::<()>(routes::PING, None, &[], &[])
            .await
    }

    pub async fn capacity(&self) -> Result<Capacity> {
        self.executor
            .call::<(), _>(routes::CAPACITY, None, &[], &[])
            .await
    }

    /// Create a container and return its handle.
    pub async fn create(&self, spec: &ContainerSpec) -> Result<String> {
        let res: CreateResponse = self
            .executor
            .call(routes::CREATE, Some(spec), &[], &[])
            .await?;
        Ok(res.handle)
    }

    /// Handles of containers whose properties match every entry of `filter`.
    pub async fn list(&self, filter: &Properties) -> Result<Vec<String>> {
        let mut query: Vec<(&str, &str)> = filter
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        query.sort_unstable();

        let res: ListResponse = self
            .executor
            .call::<(), _>(routes::LIST, None, &[], &query)
            .await?;
        Ok(res.handles)
    }

    pub async fn destroy(&self, handle: &str) -> Result<()> {
        self.executor
            .call_unit::<()>(routes::DESTROY, None, &[("handle", handle)], &[])
            .await
    }

    pub async fn stop(&self, handle: &str, kill: bool) -> Result<()> {
        self.executor
            .call_unit(
                routes::STOP,
                Some(&StopRequest { kill }),
                &[("handle", handle)],
                &[],
            )
            .await
    }

    pub async fn info(&self, handle: &str) -> Result<ContainerInfo> {
        self.executor
            .call::<(), _>(routes::INFO, None, &[("handle", handle)], &[])
            .await
    }

    pub async fn bulk_info(&self, handles: &[&str]) -> Result<HashMap<String, ContainerInfoEntry>> {
        let joined = handles.join(",");
        self.executor
            .call::<(), _>(routes::BULK_INFO, None, &[], &[("handles", joined.as_str())])
            .await
    }

    pub async fn bulk_metrics(
        &self,
        handles: &[&str],
    ) -> Result<HashMap<String, ContainerMetricsEntry>> {
        let joined = handles.join(",");
        self.executor
            .call::<(), _>(routes::BULK_METRICS, None, &[], &[("handles", joined.as_str())])
            .await
    }

    pub async fn limit_bandwidth(
        &self,
        handle: &str,
        limits: &BandwidthLimits,
    ) -> Result<BandwidthLimits> {
        self.executor
            .call(routes::LIMIT_BANDWIDTH, Some(limits), &[("handle", handle)], &[])
            .await
    }

    pub async fn current_bandwidth_limits(&self, handle: &str) -> Result<BandwidthLimits> {
        self.executor
            .call::<(), _>(routes::CURRENT_BANDWIDTH_LIMITS, None, &[("handle", handle)], &[])
            .await
    }

    pub async fn limit_cpu(&self, handle: &str, limits: &CpuLimits) -> Result<CpuLimits> {
        self.executor
            .call(routes::LIMIT_CPU, Some(limits), &[("handle", handle)], &[])
            .await
    }

    pub async fn current_cpu_limits(&self, handle: &str) -> Result<CpuLimits> {
        self.executor
            .call::<(), _>(routes::CURRENT_CPU_LIMITS, None, &[("handle", handle)], &[])
            .await
    }

    pub async fn limit_disk(&self, handle: &str, limits: &DiskLimits) -> Result<DiskLimits> {
        self.executor
            .call(routes::LIMIT_DISK, Some(limits), &[("handle", handle)], &[])
            .await
    }

    pub async fn current_disk_limits(&self, handle: &str) -> Result<DiskLimits> {
        self.executor
            .call::<(), _>(routes::CURRENT_DISK_LIMITS, None, &[("handle", handle)], &[])
            .await
    }

    pub async fn limit_memory(&self, handle: &str, limits: &MemoryLimits) -> Result<MemoryLimits> {
        self.executor
            .call(routes::LIMIT_MEMORY, Some(limits), &[("handle", handle)], &[])
            .await
    }

    pub async fn current_memory_limits(&self, handle: &str) -> Result<MemoryLimits> {
        self.executor
            .call::<(), _>(routes::CURRENT_MEMORY_LIMITS, None, &[("handle", handle)], &[])
            .await
    }

    /// Map a host port to a container port. Zero asks the server to choose.
    ///
    /// Returns the `(host_port, container_port)` pair actually mapped.
    pub async fn net_in(
        &self,
        handle: &str,
        host_port: u32,
        container_port: u32,
    ) -> Result<(u32, u32)> {
        let req = NetInRequest {
            handle,
            host_port,
            container_port,
        };
        let res: NetInResponse = self
            .executor
            .call(routes::NET_IN, Some(&req), &[("handle", handle)], &[])
            .await?;
        Ok((res.host_port, res.container_port))
    }

    pub async fn net_out(&self, handle: &str, rule: &NetOutRule) -> Result<()> {
        self.executor
            .call_unit(routes::NET_OUT, Some(rule), &[("handle", handle)], &[])
            .await
    }

    pub async fn properties(&self, handle: &str) -> Result<Properties> {
        self.executor
            .call::<(), _>(routes::PROPERTIES, None, &[("handle", handle)], &[])
            .await
    }

    pub async fn property(&self, handle: &str, name: &str) -> Result<String> {
        let res: PropertyValue = self
            .executor
            .call::<(), _>(routes::PROPERTY, None, &[("handle", handle), ("key", name)], &[])
            .await?;
        Ok(res.value)
    }

    pub async fn set_property(&self, handle: &str, name: &str, value: &str) -> Result<()> {
        self.executor
            .call_unit(
                routes::SET_PROPERTY,
                Some(&PropertyValue {
                    value: value.to_string(),
                }),
                &[("handle", handle), ("key", name)],
                &[],
            )
            .await
    }

    pub async fn remove_property(&self, handle: &str, name: &str) -> Result<()> {
        self.executor
            .call_unit::<()>(
                routes::REMOVE_PROPERTY,
                None,
                &[("handle", handle), ("key", name)],
                &[],
            )
            .await
    }

    pub async fn metrics(&self, handle: &str) -> Result<Metrics> {
        self.executor
            .call::<(), _>(routes::METRICS, None, &[("handle", handle)], &[])
            .await
    }

    /// Upload a tar stream and extract it at `destination` in the container.
    pub async fn stream_in<R>(&self, handle: &str, destination: &str, tar: R) -> Result<()>
    where
        R: AsyncRead + Send + 'static,
    {
        self.executor
            .stream(
                routes::STREAM_IN,
                Some((reader_body(tar), TAR_CONTENT_TYPE)),
                &[("handle", handle)],
                &[("destination", destination)],
            )
            .await
            .map(drop)
    }

    /// Download `source` from the container as a tar stream.
    pub async fn stream_out(&self, handle: &str, source: &str) -> Result<ResponseReader> {
        self.executor
            .stream(
                routes::STREAM_OUT,
                None,
                &[("handle", handle)],
                &[("source", source)],
            )
            .await
    }

    /// Start a process in the container.
    ///
    /// Returns once the server has assigned a process id and the requested
    /// output streams are attached. The process keeps running after the
    /// returned [`Process`] is dropped.
    pub async fn run(&self, handle: &str, spec: &ProcessSpec, io: ProcessIo) -> Result<Process> {
        let body = Bytes::from(JsonCodec::encode(spec)?);
        let control = self
            .hijacker
            .hijack(
                HijackRequest::new(routes::RUN, &[("handle", handle)])
                    .body(&body, JsonCodec::CONTENT_TYPE),
            )
            .await?;

        streaming::stream_process(self.hijacker.as_ref(), handle, control, io, &self.config).await
    }

    /// Attach to a process that is already running.
    pub async fn attach(&self, handle: &str, process_id: u32, io: ProcessIo) -> Result<Process> {
        let pid = process_id.to_string();
        let control = self
            .hijacker
            .hijack(HijackRequest::new(
                routes::ATTACH,
                &[("handle", handle), ("pid", pid.as_str())],
            ))
            .await?;

        streaming::stream_process(self.hijacker.as_ref(), handle, control, io, &self.config).await
    }
}

#[derive(Deserialize)]
struct CreateResponse {
    handle: String,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default, alias = "Handles")]
    handles: Vec<String>,
}

#[derive(Serialize)]
struct StopRequest {
    kill: bool,
}

#[derive(Serialize, Deserialize)]
struct PropertyValue {
    #[serde(default)]
    value: String,
}

#[derive(Serialize)]
struct NetInRequest<'a> {
    handle: &'a str,
    host_port: u32,
    container_port: u32,
}

#[derive(Deserialize)]
struct NetInResponse {
    host_port: u32,
    container_port: u32,
}
