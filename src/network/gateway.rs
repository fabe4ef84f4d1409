use crate::blockchain::{
    AccountBalance, BlockOverview, Header, PeerInfo, SendReply, Transaction, TransactionDetail,
    TxHash,
};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Client surface of one ledger node.
#[async_trait]
pub trait LedgerNode: Send + Sync {
    async fn send_transaction(&self, tx: &Transaction) -> Result<SendReply>;
    async fn query_transaction(&self, hash: &TxHash) -> Result<TransactionDetail>;
    async fn get_balance(&self, addresses: &[String], execer: &str)
        -> Result<Vec<AccountBalance>>;
    async fn get_last_header(&self) -> Result<Header>;
    async fn get_peer_info(&self) -> Result<Vec<PeerInfo>>;
    async fn get_block_by_height(&self, height: i64) -> Result<BlockOverview>;
    async fn get_total_tx_count(&self, height: i64) -> Result<i64>;
}

/// Opens connections to ledger nodes.
#[async_trait]
pub trait Connector: Send + Sync {
    /// A fresh connection, owned by a pool for the duration of one send.
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn LedgerNode>>;

    /// A long-lived handle for read calls; never checked in or out.
    fn handle(&self, endpoint: &Endpoint) -> Arc<dyn LedgerNode>;
}

/// Where admitted transactions go. The dispatch pipeline only sees this.
#[async_trait]
pub trait TransactionSink: Send + Sync {
    async fn deliver(&self, tx: &Transaction) -> Result<SendReply>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Rpc,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub url: String,
    pub transport: Transport,
}

impl Endpoint {
    pub fn rpc(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            transport: Transport::Rpc,
        }
    }

    pub fn json(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            transport: Transport::Json,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.transport {
            Transport::Rpc => write!(f, "rpc://{}", self.url),
            Transport::Json => f.write_str(&self.url),
        }
    }
}
