//! Client builder and facade.
//!
//! The [`ClientBuilder`] collects the server address and tuning knobs and
//! builds a [`Client`]. Every facade call borrows a [`Connection`] from the
//! client's pool for the duration of one operation:
//! 1. Acquire a connection (idle one, or a new one from the provider)
//! 2. Perform the operation
//! 3. Release it, unless the operation failed at the transport level
//!
//! # Example
//!
//! ```ignore
//! use garden_client::{Address, Client, ContainerSpec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder()
//!         .address(Address::parse("tcp", "127.0.0.1:7777")?)
//!         .max_idle_connections(8)
//!         .build()?;
//!
//!     client.ping().await?;
//!     let container = client.create(&ContainerSpec::default()).await?;
//!     println!("created {}", container.handle());
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::connection::{Connection, ConnectionConfig};
use crate::container::Container;
use crate::error::{GardenError, Result};
use crate::pool::{ConnectionPool, ConnectionProvider, DEFAULT_MAX_IDLE_CONNECTIONS};
use crate::transport::{Address, Hijacker, HttpHijacker};
use crate::types::{Capacity, ContainerInfoEntry, ContainerMetricsEntry, ContainerSpec, Properties};

/// Run one operation on a pooled connection.
///
/// `pooled!(pool, conn => conn.ping())` acquires `conn`, awaits the call and
/// hands the connection back according to the result.
macro_rules! pooled {
    ($pool:expr, $conn:ident => $call:expr) => {{
        let pool = &$pool;
        let $conn = pool.acquire()?;
        let result = $call.await;
        $crate::client::release_connection(pool, $conn, &result);
        result
    }};
}

pub(crate) use pooled;

/// Release `conn` back to `pool`, or drop it if `result` is a transport error.
pub(crate) fn release_connection<P: ConnectionProvider, T>(
    pool: &ConnectionPool<P>,
    conn: P::Connection,
    result: &Result<T>,
) {
    match result {
        Err(e) if e.is_transport() => {
            tracing::debug!("discarding connection after transport error: {}", e);
        }
        _ => pool.release(conn),
    }
}

/// Provides connections to one server address.
#[derive(Debug, Clone)]
pub struct NetworkProvider {
    address: Address,
    config: ConnectionConfig,
}

impl NetworkProvider {
    pub fn new(address: Address, config: ConnectionConfig) -> Self {
        Self { address, config }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }
}

impl ConnectionProvider for NetworkProvider {
    type Connection = Connection<HttpHijacker>;

    fn provide_connection(&self) -> Result<Self::Connection> {
        Connection::with_config(self.address.clone(), self.config.clone())
    }
}

/// Builder for configuring and creating a [`Client`].
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    address: Option<Address>,
    max_idle_connections: Option<usize>,
    config: ConnectionConfig,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server address. Required.
    pub fn address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Idle connections kept for reuse.
    ///
    /// Default: 20
    pub fn max_idle_connections(mut self, limit: usize) -> Self {
        self.max_idle_connections = Some(limit);
        self
    }

    /// Control frames that may queue before stdin forwarding waits.
    ///
    /// Default: 64
    pub fn writer_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.writer.channel_capacity = capacity;
        self
    }

    /// Read size used when forwarding stdin.
    ///
    /// Default: 32 KiB
    pub fn copy_buffer_size(mut self, size: usize) -> Self {
        self.config.copy_buffer_size = size;
        self
    }

    /// Upper bound on a single control payload.
    ///
    /// Default: 16 MiB
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.config.max_payload_size = size;
        self
    }

    pub fn build(self) -> Result<Client> {
        let address = self
            .address
            .ok_or_else(|| GardenError::InvalidRequest("no server address configured".into()))?;

        Ok(Client::with_provider(
            NetworkProvider::new(address, self.config),
            self.max_idle_connections
                .unwrap_or(DEFAULT_MAX_IDLE_CONNECTIONS),
        ))
    }
}

/// Entry point for talking to a garden server.
///
/// Cheap to clone; clones share one connection pool.
pub struct Client<P: ConnectionProvider = NetworkProvider> {
    pool: Arc<ConnectionPool<P>>,
}

impl<P: ConnectionProvider> Clone for Client<P> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<P: ConnectionProvider> std::fmt::Debug for Client<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("pool", &self.pool).finish()
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Client for `address` with default settings.
    pub fn new(address: Address) -> Result<Self> {
        Self::builder().address(address).build()
    }
}

impl<P, H> Client<P>
where
    P: ConnectionProvider<Connection = Connection<H>>,
    H: Hijacker,
{
    pub fn with_provider(provider: P, max_idle_connections: usize) -> Self {
        Self {
            pool: Arc::new(ConnectionPool::with_max_idle(provider, max_idle_connections)),
        }
    }

    pub fn pool(&self) -> &ConnectionPool<P> {
        &self.pool
    }

    pub async fn ping(&self) -> Result<()> {
        pooled!(self.pool, conn => conn.ping())
    }

    pub async fn capacity(&self) -> Result<Capacity> {
        pooled!(self.pool, conn => conn.capacity())
    }

    pub async fn create(&self, spec: &ContainerSpec) -> Result<Container<P>> {
        let handle = pooled!(self.pool, conn => conn.create(spec))?;
        Ok(self.container(handle))
    }

    /// Containers whose properties match every entry of `filter`.
    pub async fn containers(&self, filter: &Properties) -> Result<Vec<Container<P>>> {
        let handles = pooled!(self.pool, conn => conn.list(filter))?;
        Ok(handles.into_iter().map(|h| self.container(h)).collect())
    }

    pub async fn destroy(&self, handle: &str) -> Result<()> {
        pooled!(self.pool, conn => conn.destroy(handle))
    }

    /// Find an existing container by handle.
    pub async fn lookup(&self, handle: &str) -> Result<Container<P>> {
        let handles = pooled!(self.pool, conn => conn.list(&Properties::new()))?;
        if handles.iter().any(|h| h == handle) {
            Ok(self.container(handle.to_string()))
        } else {
            Err(GardenError::ContainerNotFound(handle.to_string()))
        }
    }

    pub async fn bulk_info(&self, handles: &[&str]) -> Result<HashMap<String, ContainerInfoEntry>> {
        pooled!(self.pool, conn => conn.bulk_info(handles))
    }

    pub async fn bulk_metrics(
        &self,
        handles: &[&str],
    ) -> Result<HashMap<String, ContainerMetricsEntry>> {
        pooled!(self.pool, conn => conn.bulk_metrics(handles))
    }

    /// Facade for `handle` without checking that the container exists.
    pub fn container(&self, handle: impl Into<String>) -> Container<P> {
        Container::new(handle.into(), self.pool.clone())
    }
}
