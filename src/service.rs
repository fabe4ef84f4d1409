//! Gateway operations behind the HTTP routes.

use crate::blockchain::{AccountBalance, Transaction, TxHash, TRANSFER_EXECER};
use crate::builder::{TxBuilder, TxKind};
use crate::config::GatewayConfig;
use crate::crypto::TxSigner;
use crate::dispatch::{AdmissionLimiter, Dispatcher, PipelineOptions};
use crate::error::{GatewayError, Result};
use crate::metrics::GatewayStats;
use crate::network::{Balancer, Connector, NodeConnector};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Block summary returned by `getBlockInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    pub height: i64,
    pub tx_count: i64,
    pub hash: String,
    pub pre_hash: String,
    /// Block time in nanoseconds, as a decimal string.
    pub create_time: String,
    pub tx_hash_list: Vec<String>,
}

pub struct Gateway {
    balancer: Arc<Balancer>,
    dispatcher: Option<Dispatcher>,
    builder: TxBuilder,
    stats: Arc<GatewayStats>,
}

impl Gateway {
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let connector = Arc::new(NodeConnector::new(
            config.connect_timeout(),
            config.request_timeout(),
        )?);
        let signer = match &config.privkey {
            Some(key) => TxSigner::from_hex(key)?,
            None => {
                warn!("no privkey configured, built transactions use an ephemeral key");
                TxSigner::generate()
            }
        };
        let pipeline = config.async_mode.then(|| config.pipeline_options());
        Self::new(
            connector,
            config,
            signer,
            config.limiter,
            pipeline,
            Arc::new(GatewayStats::new()),
        )
    }

    /// Assembles a gateway; `pipeline` set means asynchronous mode.
    pub fn new(
        connector: Arc<dyn Connector>,
        config: &GatewayConfig,
        signer: TxSigner,
        limiter: usize,
        pipeline: Option<PipelineOptions>,
        stats: Arc<GatewayStats>,
    ) -> Result<Self> {
        let endpoints = config.endpoints();
        if endpoints.is_empty() {
            return Err(GatewayError::NoEndpoints);
        }
        let balancer = Arc::new(Balancer::from_endpoints(
            &endpoints,
            connector,
            config.pool_options(),
        ));
        let dispatcher = pipeline.map(|options| {
            Dispatcher::start(
                balancer.clone(),
                AdmissionLimiter::new(limiter),
                stats.clone(),
                options,
            )
        });
        info!(
            "gateway ready: {} endpoints, limiter {}, async {}",
            endpoints.len(),
            limiter,
            dispatcher.is_some()
        );
        Ok(Self {
            balancer,
            dispatcher,
            builder: TxBuilder::new(signer, config.transfer_to.clone()),
            stats,
        })
    }

    pub fn is_async(&self) -> bool {
        self.dispatcher.is_some()
    }

    pub fn stats(&self) -> &Arc<GatewayStats> {
        &self.stats
    }

    pub fn dispatcher(&self) -> Option<&Dispatcher> {
        self.dispatcher.as_ref()
    }

    /// Forwards a hex-encoded transaction. In asynchronous mode the result is
    /// the locally computed hash and downstream failures are retried silently.
    pub async fn send_tx(&self, hex_tx: &str) -> Result<TxHash> {
        let tx = Transaction::from_hex(hex_tx)?;
        match &self.dispatcher {
            Some(dispatcher) => dispatcher.submit(tx),
            None => self.send_tx_sync(tx).await,
        }
    }

    async fn send_tx_sync(&self, tx: Transaction) -> Result<TxHash> {
        let reply = self.balancer.send_transaction(&tx).await?;
        if !reply.is_ok {
            return Err(GatewayError::Rejected(reply.message()));
        }
        self.stats.record_accepted();
        match <[u8; 32]>::try_from(reply.msg.as_slice()) {
            Ok(hash) => Ok(TxHash(hash)),
            Err(_) => tx.hash(),
        }
    }

    pub fn create_tx(&self, is_transfer: bool, size: &str) -> Result<String> {
        let kind = if is_transfer {
            TxKind::Transfer
        } else {
            let size = size
                .trim()
                .parse::<usize>()
                .map_err(|e| GatewayError::InvalidRequest(format!("size: {}", e)))?;
            TxKind::Write { size }
        };
        self.builder.build_hex(kind)
    }

    pub async fn block_height(&self) -> Result<i64> {
        Ok(self.balancer.reader()?.get_last_header().await?.height)
    }

    pub async fn node_count(&self) -> Result<usize> {
        Ok(self.balancer.reader()?.get_peer_info().await?.len())
    }

    pub fn tx_accepted(&self) -> u64 {
        self.stats.accepted()
    }

    pub async fn tx_confirmed(&self) -> Result<i64> {
        let height = self.block_height().await?;
        self.balancer.reader()?.get_total_tx_count(height).await
    }

    /// Looks up the stored copy of a hex-encoded transaction.
    pub async fn tx_info(&self, hex_tx: &str) -> Result<TxHash> {
        let tx = Transaction::from_hex(hex_tx)?;
        let detail = self.balancer.reader()?.query_transaction(&tx.hash()?).await?;
        detail.tx.hash()
    }

    /// Coins balance of the account that signed a hex-encoded transaction.
    pub async fn balance(&self, hex_tx: &str) -> Result<Vec<AccountBalance>> {
        let tx = Transaction::from_hex(hex_tx)?;
        let addr = tx.sender()?;
        self.balancer
            .reader()?
            .get_balance(&[addr], TRANSFER_EXECER)
            .await
    }

    pub async fn block_info(&self, height: &str) -> Result<BlockInfo> {
        let height = height
            .trim()
            .parse::<i64>()
            .map_err(|e| GatewayError::InvalidRequest(format!("height: {}", e)))?;
        let block = self.balancer.reader()?.get_block_by_height(height).await?;
        Ok(BlockInfo {
            height: block.head.height,
            tx_count: block.head.tx_count,
            hash: block.head.hash,
            pre_hash: block.head.parent_hash,
            create_time: (block.head.block_time.saturating_mul(1_000_000_000)).to_string(),
            tx_hash_list: block.tx_hashes,
        })
    }

    /// Closes the pipeline (dropping anything still queued) and the pools.
    pub async fn close(&self) {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.shutdown().await;
        }
        self.balancer.close();
    }
}
