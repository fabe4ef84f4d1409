//! In-memory ledger node doubles.
//!
//! Compiled for the crate's own tests and, with the `test-util` feature, for
//! integration tests and downstream crates.

use super::gateway::{Connector, Endpoint, LedgerNode};
use crate::blockchain::{
    AccountBalance, BlockOverview, Header, PeerInfo, SendReply, Transaction, TransactionDetail,
    TxHash,
};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::{Duration, sleep};

/// Ledger node that accepts everything unless told otherwise and remembers
/// the hashes it accepted. Reads return canned data: height 12, three peers,
/// total transaction count `height * 10`.
#[derive(Default)]
pub struct MockNode {
    pub label: String,
    sends: AtomicUsize,
    accepted: Mutex<HashSet<TxHash>>,
    reject: AtomicBool,
    reject_first: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    latency: Mutex<Duration>,
}

impl MockNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn accepted(&self) -> HashSet<TxHash> {
        self.accepted.lock().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Negatively acknowledge every send until reset.
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Negatively acknowledge the next `n` sends.
    pub fn reject_first(&self, n: usize) {
        self.reject_first.store(n, Ordering::SeqCst);
    }

    /// Time each send spends in flight.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    fn header(&self) -> Header {
        Header {
            height: 12,
            hash: "0x0c".to_string(),
            parent_hash: "0x0b".to_string(),
            block_time: 1_700_000_000,
            tx_count: 4,
        }
    }

    fn rejecting(&self) -> bool {
        self.reject.load(Ordering::SeqCst)
            || self
                .reject_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
    }
}

#[async_trait]
impl LedgerNode for MockNode {
    async fn send_transaction(&self, tx: &Transaction) -> Result<SendReply> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.rejecting() {
            return Ok(SendReply::rejected("ErrTxExist"));
        }
        let hash = tx.hash()?;
        self.accepted.lock().insert(hash);
        Ok(SendReply::accepted(hash))
    }

    async fn query_transaction(&self, hash: &TxHash) -> Result<TransactionDetail> {
        let mut tx = Transaction::new("user.write", hash.0.to_vec());
        tx.nonce = 1;
        Ok(TransactionDetail {
            tx,
            height: 12,
            index: 0,
            block_time: 1_700_000_000,
        })
    }

    async fn get_balance(
        &self,
        addresses: &[String],
        _execer: &str,
    ) -> Result<Vec<AccountBalance>> {
        Ok(addresses
            .iter()
            .map(|addr| AccountBalance {
                addr: addr.clone(),
                balance: 100,
                frozen: 0,
                currency: 0,
            })
            .collect())
    }

    async fn get_last_header(&self) -> Result<Header> {
        Ok(self.header())
    }

    async fn get_peer_info(&self) -> Result<Vec<PeerInfo>> {
        Ok((0..3)
            .map(|i| PeerInfo {
                addr: format!("10.0.0.{}:13802", i),
                name: format!("peer-{}", i),
            })
            .collect())
    }

    async fn get_block_by_height(&self, height: i64) -> Result<BlockOverview> {
        let mut head = self.header();
        head.height = height;
        Ok(BlockOverview {
            head,
            tx_hashes: vec!["0xaa".to_string(), "0xbb".to_string()],
        })
    }

    async fn get_total_tx_count(&self, height: i64) -> Result<i64> {
        Ok(height * 10)
    }
}

/// Hands out one shared [`MockNode`] per endpoint URL.
#[derive(Default)]
pub struct MockConnector {
    nodes: Mutex<HashMap<String, Arc<MockNode>>>,
    connects: AtomicUsize,
    failing_connects: AtomicUsize,
    connect_delay: Mutex<Duration>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, url: &str) -> Arc<MockNode> {
        self.nodes
            .lock()
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(MockNode::new(url)))
            .clone()
    }

    pub fn nodes(&self) -> Vec<Arc<MockNode>> {
        self.nodes.lock().values().cloned().collect()
    }

    /// Successful connects so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Refuse the next `n` connection attempts.
    pub fn fail_next_connects(&self, n: usize) {
        self.failing_connects.store(n, Ordering::SeqCst);
    }

    /// Time each connect takes before it resolves.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock() = delay;
    }

    /// Hashes accepted across every node.
    pub fn accepted(&self) -> HashSet<TxHash> {
        self.nodes().iter().flat_map(|n| n.accepted()).collect()
    }

    pub fn sends(&self) -> usize {
        self.nodes().iter().map(|n| n.sends()).sum()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn LedgerNode>> {
        let delay = *self.connect_delay.lock();
        if !delay.is_zero() {
            sleep(delay).await;
        }
        let failing = self
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(GatewayError::Transport(format!("{}: refused", endpoint)));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.node(&endpoint.url))
    }

    fn handle(&self, endpoint: &Endpoint) -> Arc<dyn LedgerNode> {
        self.node(&endpoint.url)
    }
}
