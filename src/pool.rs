//! Bounded cache of reusable connections.
//!
//! The pool never blocks: `acquire` pops an idle connection or asks the
//! provider for a new one, and `release` either keeps the connection or
//! drops it when the pool is full. It knows nothing about connection health;
//! a caller whose call failed at the transport level should drop the
//! connection instead of releasing it.

use std::sync::Mutex;

use crate::error::Result;

/// Default number of idle connections kept by a pool.
pub const DEFAULT_MAX_IDLE_CONNECTIONS: usize = 20;

/// Source of new connections for a [`ConnectionPool`].
pub trait ConnectionProvider: Send + Sync {
    type Connection: Send;

    fn provide_connection(&self) -> Result<Self::Connection>;
}

/// LIFO pool of idle connections, capped at `max_idle`.
pub struct ConnectionPool<P: ConnectionProvider> {
    provider: P,
    idle: Mutex<Vec<P::Connection>>,
    max_idle: usize,
}

impl<P: ConnectionProvider> ConnectionPool<P> {
    pub fn new(provider: P) -> Self {
        Self::with_max_idle(provider, DEFAULT_MAX_IDLE_CONNECTIONS)
    }

    pub fn with_max_idle(provider: P, max_idle: usize) -> Self {
        Self {
            provider,
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
        }
    }

    /// Take an idle connection, or create one if none is cached.
    pub fn acquire(&self) -> Result<P::Connection> {
        if let Some(conn) = self.lock().pop() {
            return Ok(conn);
        }
        self.provider.provide_connection()
    }

    /// Return a connection. Dropped (closed) if the pool is already full.
    pub fn release(&self, conn: P::Connection) {
        let mut idle = self.lock();
        if idle.len() < self.max_idle {
            idle.push(conn);
            return;
        }
        drop(idle);

        tracing::trace!("connection pool full ({}), discarding connection", self.max_idle);
        drop(conn);
    }

    /// Number of idle connections currently cached.
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<P::Connection>> {
        // A panic while holding the lock cannot leave the Vec half-updated.
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<P: ConnectionProvider> std::fmt::Debug for ConnectionPool<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("idle", &self.idle())
            .field("max_idle", &self.max_idle)
            .finish()
    }
}
