use super::gateway::{Connector, Endpoint, LedgerNode};
use crate::error::{GatewayError, Result};
use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Connections kept warm after being returned.
    pub max_idle: usize,
    /// Upper bound on connections checked out at once.
    pub max_active: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_idle: 8,
            max_active: 64,
        }
    }
}

/// Reusable connections to a single endpoint.
pub struct ConnectionPool {
    endpoint: Endpoint,
    connector: Arc<dyn Connector>,
    options: PoolOptions,
    idle: Mutex<Vec<Arc<dyn LedgerNode>>>,
    /// One permit per connection checked out or being dialed.
    slots: Arc<Semaphore>,
    max_active: usize,
    closed: AtomicBool,
}

impl ConnectionPool {
    pub fn new(endpoint: Endpoint, connector: Arc<dyn Connector>, options: PoolOptions) -> Arc<Self> {
        let max_active = options.max_active.min(Semaphore::MAX_PERMITS);
        Arc::new(Self {
            endpoint,
            connector,
            options,
            idle: Mutex::new(Vec::new()),
            slots: Arc::new(Semaphore::new(max_active)),
            max_active,
            closed: AtomicBool::new(false),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Checks out a connection, reusing an idle one when available.
    pub async fn get(self: &Arc<Self>) -> Result<PooledConnection> {
        if self.closed.load(Ordering::Acquire) {
            return Err(GatewayError::PoolClosed(self.endpoint.to_string()));
        }

        // held across the dial so a dropped checkout gives the slot back
        let slot = self
            .slots
            .clone()
            .try_acquire_owned()
            .map_err(|e| match e {
                TryAcquireError::NoPermits => GatewayError::PoolExhausted(self.endpoint.to_string()),
                TryAcquireError::Closed => GatewayError::PoolClosed(self.endpoint.to_string()),
            })?;

        let reused = self.idle.lock().pop();
        let conn = match reused {
            Some(conn) => conn,
            None => self.connector.connect(&self.endpoint).await?,
        };

        Ok(PooledConnection {
            conn,
            pool: Arc::clone(self),
            broken: false,
            _slot: slot,
        })
    }

    fn put(&self, conn: Arc<dyn LedgerNode>, broken: bool) {
        if broken || self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.options.max_idle {
            idle.push(conn);
        }
    }

    /// Refuses further checkouts and drops idle connections. Checked-out
    /// connections are dropped when returned.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.slots.close();
        self.idle.lock().clear();
    }

    pub fn active(&self) -> usize {
        self.max_active - self.slots.available_permits()
    }

    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }
}

/// A checked-out connection; goes back to its pool on drop unless discarded.
pub struct PooledConnection {
    conn: Arc<dyn LedgerNode>,
    pool: Arc<ConnectionPool>,
    broken: bool,
    _slot: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Marks the connection unusable so it is not returned to the pool.
    pub fn discard(&mut self) {
        self.broken = true;
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.pool.endpoint()
    }
}

impl Deref for PooledConnection {
    type Target = dyn LedgerNode;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.pool.put(Arc::clone(&self.conn), self.broken);
    }
}
