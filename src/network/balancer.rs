use super::gateway::{Connector, Endpoint, LedgerNode, TransactionSink};
use super::pool::{ConnectionPool, PoolOptions};
use crate::blockchain::{SendReply, Transaction};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use log::debug;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Spreads calls across ledger nodes by uniform random choice.
///
/// Sends check a connection out of one per-endpoint [`ConnectionPool`];
/// reads go through long-lived handles that are shared, not checked out.
pub struct Balancer {
    pools: RwLock<Vec<Arc<ConnectionPool>>>,
    readers: RwLock<Vec<Arc<dyn LedgerNode>>>,
    connector: Arc<dyn Connector>,
    options: PoolOptions,
    rng: Mutex<StdRng>,
}

impl Balancer {
    pub fn new(connector: Arc<dyn Connector>, options: PoolOptions) -> Self {
        Self::with_rng(connector, options, StdRng::from_entropy())
    }

    pub fn with_rng(connector: Arc<dyn Connector>, options: PoolOptions, rng: StdRng) -> Self {
        Self {
            pools: RwLock::new(Vec::new()),
            readers: RwLock::new(Vec::new()),
            connector,
            options,
            rng: Mutex::new(rng),
        }
    }

    pub fn from_endpoints(
        endpoints: &[Endpoint],
        connector: Arc<dyn Connector>,
        options: PoolOptions,
    ) -> Self {
        let balancer = Self::new(connector, options);
        for endpoint in endpoints {
            balancer.add_endpoint(endpoint.clone());
        }
        balancer
    }

    /// Registers an endpoint for both the write and read paths.
    pub fn add_endpoint(&self, endpoint: Endpoint) {
        let reader = self.connector.handle(&endpoint);
        let pool = ConnectionPool::new(endpoint, self.connector.clone(), self.options.clone());
        self.pools.write().push(pool);
        self.readers.write().push(reader);
    }

    pub fn len(&self) -> usize {
        self.pools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.pools
            .read()
            .iter()
            .map(|pool| pool.endpoint().clone())
            .collect()
    }

    fn pick(&self, len: usize) -> usize {
        self.rng.lock().gen_range(0..len)
    }

    /// Picks a pool for the write path.
    pub fn pool(&self) -> Result<Arc<ConnectionPool>> {
        let pools = self.pools.read();
        if pools.is_empty() {
            return Err(GatewayError::NoEndpoints);
        }
        Ok(pools[self.pick(pools.len())].clone())
    }

    /// Picks a read handle.
    pub fn reader(&self) -> Result<Arc<dyn LedgerNode>> {
        let readers = self.readers.read();
        if readers.is_empty() {
            return Err(GatewayError::NoEndpoints);
        }
        Ok(readers[self.pick(readers.len())].clone())
    }

    /// One send attempt against a randomly chosen endpoint.
    pub async fn send_transaction(&self, tx: &Transaction) -> Result<SendReply> {
        let pool = self.pool()?;
        let mut conn = pool.get().await?;
        match conn.send_transaction(tx).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                debug!("send via {} failed, discarding connection: {}", conn.endpoint(), e);
                conn.discard();
                Err(e)
            }
        }
    }

    pub fn close(&self) {
        for pool in self.pools.read().iter() {
            pool.close();
        }
    }
}

#[async_trait]
impl TransactionSink for Balancer {
    async fn deliver(&self, tx: &Transaction) -> Result<SendReply> {
        self.send_transaction(tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::testing::MockConnector;

    fn balancer(m: usize) -> (Arc<MockConnector>, Balancer) {
        let connector = Arc::new(MockConnector::new());
        let endpoints: Vec<Endpoint> = (0..m)
            .map(|i| Endpoint::rpc(format!("node-{}:8802", i)))
            .collect();
        let balancer = Balancer::from_endpoints(&endpoints, connector.clone(), PoolOptions::default());
        (connector, balancer)
    }

    #[tokio::test]
    async fn write_path_is_roughly_uniform() {
        let (connector, balancer) = balancer(3);
        let tx = Transaction::new("user.write", b"x".to_vec());
        let trials = 6000;
        for _ in 0..trials {
            assert!(balancer.send_transaction(&tx).await.unwrap().is_ok);
        }

        let expected = trials / 3;
        for i in 0..3 {
            let sends = connector.node(&format!("node-{}:8802", i)).sends();
            let deviation = (sends as f64 - expected as f64).abs() / expected as f64;
            assert!(deviation < 0.1, "endpoint {} got {} of {}", i, sends, trials);
        }
    }

    #[tokio::test]
    async fn read_path_is_roughly_uniform() {
        let (_, balancer) = balancer(4);
        let trials = 8000;
        let mut hits = std::collections::HashMap::new();
        for _ in 0..trials {
            let reader = balancer.reader().unwrap();
            let key = Arc::as_ptr(&reader) as *const () as usize;
            *hits.entry(key).or_insert(0usize) += 1;
        }
        assert_eq!(hits.len(), 4);
        for count in hits.values() {
            let deviation = (*count as f64 - 2000.0).abs() / 2000.0;
            assert!(deviation < 0.1, "got {}", count);
        }
    }

    #[tokio::test]
    async fn empty_balancer_has_no_endpoints() {
        let (_, balancer) = balancer(0);
        assert!(balancer.is_empty());
        assert!(matches!(balancer.reader(), Err(GatewayError::NoEndpoints)));
        let tx = Transaction::new("user.write", vec![]);
        assert!(matches!(
            balancer.send_transaction(&tx).await,
            Err(GatewayError::NoEndpoints)
        ));
    }

    #[tokio::test]
    async fn rejection_is_returned_not_raised() {
        let (connector, balancer) = balancer(1);
        connector.node("node-0:8802").set_reject(true);
        let tx = Transaction::new("user.write", vec![1]);
        let reply = balancer.send_transaction(&tx).await.unwrap();
        assert!(!reply.is_ok);
        assert_eq!(reply.message(), "ErrTxExist");
    }

    #[tokio::test]
    async fn connect_failure_surfaces_to_caller() {
        let (connector, balancer) = balancer(1);
        connector.fail_next_connects(1);
        let tx = Transaction::new("user.write", vec![1]);
        let err = balancer.send_transaction(&tx).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn closed_balancer_refuses_sends() {
        let (_, balancer) = balancer(2);
        balancer.close();
        let tx = Transaction::new("user.write", vec![1]);
        assert!(matches!(
            balancer.send_transaction(&tx).await,
            Err(GatewayError::PoolClosed(_))
        ));
    }
}
