//! Per-container facade.

use std::sync::Arc;

use tokio::io::AsyncRead;

use crate::client::pooled;
use crate::connection::{Connection, ResponseReader};
use crate::error::Result;
use crate::pool::{ConnectionPool, ConnectionProvider};
use crate::process::{Process, ProcessIo};
use crate::transport::Hijacker;
use crate::types::{
    BandwidthLimits, ContainerInfo, CpuLimits, DiskLimits, MemoryLimits, Metrics, NetOutRule,
    ProcessSpec, Properties,
};

/// A container on the server, addressed by its handle.
///
/// Holds no connection of its own; each call borrows one from the client's
/// pool.
pub struct Container<P: ConnectionProvider> {
    handle: String,
    pool: Arc<ConnectionPool<P>>,
}

impl<P: ConnectionProvider> Clone for Container<P> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            pool: self.pool.clone(),
        }
    }
}

impl<P: ConnectionProvider> std::fmt::Debug for Container<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("handle", &self.handle)
            .finish()
    }
}

impl<P, H> Container<P>
where
    P: ConnectionProvider<Connection = Connection<H>>,
    H: Hijacker,
{
    pub(crate) fn new(handle: String, pool: Arc<ConnectionPool<P>>) -> Self {
        Self { handle, pool }
    }

    #[inline]
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Stop every process in the container. `kill` sends SIGKILL instead of
    /// SIGTERM.
    pub async fn stop(&self, kill: bool) -> Result<()> {
        pooled!(self.pool, conn => conn.stop(&self.handle, kill))
    }

    pub async fn info(&self) -> Result<ContainerInfo> {
        pooled!(self.pool, conn => conn.info(&self.handle))
    }

    /// Upload a tar stream into `destination`.
    pub async fn stream_in<R>(&self, destination: &str, tar: R) -> Result<()>
    where
        R: AsyncRead + Send + 'static,
    {
        pooled!(self.pool, conn => conn.stream_in(&self.handle, destination, tar))
    }

    /// Download `source` as a tar stream.
    pub async fn stream_out(&self, source: &str) -> Result<ResponseReader> {
        pooled!(self.pool, conn => conn.stream_out(&self.handle, source))
    }

    pub async fn limit_bandwidth(&self, limits: &BandwidthLimits) -> Result<BandwidthLimits> {
        pooled!(self.pool, conn => conn.limit_bandwidth(&self.handle, limits))
    }

    pub async fn current_bandwidth_limits(&self) -> Result<BandwidthLimits> {
        pooled!(self.pool, conn => conn.current_bandwidth_limits(&self.handle))
    }

    pub async fn limit_cpu(&self, limits: &CpuLimits) -> Result<CpuLimits> {
        pooled!(self.pool, conn => conn.limit_cpu(&self.handle, limits))
    }

    pub async fn current_cpu_limits(&self) -> Result<CpuLimits> {
        pooled!(self.pool, conn => conn.current_cpu_limits(&self.handle))
    }

    pub async fn limit_disk(&self, limits: &DiskLimits) -> Result<DiskLimits> {
        pooled!(self.pool, conn => conn.limit_disk(&self.handle, limits))
    }

    pub async fn current_disk_limits(&self) -> Result<DiskLimits> {
        pooled!(self.pool, conn => conn.current_disk_limits(&self.handle))
    }

    pub async fn limit_memory(&self, limits: &MemoryLimits) -> Result<MemoryLimits> {
        pooled!(self.pool, conn => conn.limit_memory(&self.handle, limits))
    }

    pub async fn current_memory_limits(&self) -> Result<MemoryLimits> {
        pooled!(self.pool, conn => conn.current_memory_limits(&self.handle))
    }

    /// Returns the `(host_port, container_port)` pair actually mapped.
    pub async fn net_in(&self, host_port: u32, container_port: u32) -> Result<(u32, u32)> {
        pooled!(self.pool, conn => conn.net_in(&self.handle, host_port, container_port))
    }

    pub async fn net_out(&self, rule: &NetOutRule) -> Result<()> {
        pooled!(self.pool, conn => conn.net_out(&self.handle, rule))
    }

    pub async fn run(&self, spec: &ProcessSpec, io: ProcessIo) -> Result<Process> {
        pooled!(self.pool, conn => conn.run(&self.handle, spec, io))
    }

    pub async fn attach(&self, process_id: u32, io: ProcessIo) -> Result<Process> {
        pooled!(self.pool, conn => conn.attach(&self.handle, process_id, io))
    }

    pub async fn metrics(&self) -> Result<Metrics> {
        pooled!(self.pool, conn => conn.metrics(&self.handle))
    }

    pub async fn properties(&self) -> Result<Properties> {
        pooled!(self.pool, conn => conn.properties(&self.handle))
    }

    pub async fn property(&self, name: &str) -> Result<String> {
        pooled!(self.pool, conn => conn.property(&self.handle, name))
    }

    pub async fn set_property(&self, name: &str, value: &str) -> Result<()> {
        pooled!(self.pool, conn => conn.set_property(&self.handle, name, value))
    }

    pub async fn remove_property(&self, name: &str) -> Result<()> {
        pooled!(self.pool, conn => conn.remove_property(&self.handle, name))
    }
}
