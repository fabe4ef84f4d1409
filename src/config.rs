//! Gateway configuration loaded from a TOML file.

use crate::dispatch::{AdmissionLimiter, PipelineOptions};
use crate::dispatch::pipeline::{MAX_QUEUE_CAPACITY, MAX_WORKERS};
use crate::error::{GatewayError, Result};
use crate::network::{Endpoint, PoolOptions};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::sync::Semaphore;
use tokio::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listen address.
    pub listen: SocketAddr,
    /// JSON transport endpoint URLs.
    pub json_rpc: Vec<String>,
    /// Remote-procedure endpoints (`host:port`).
    pub rpc: Vec<String>,
    /// Admission limiter capacity.
    pub limiter: usize,
    /// Forward transactions through the dispatch pipeline instead of inline.
    #[serde(rename = "async")]
    pub async_mode: bool,
    /// Hex ed25519 seed used by the transaction builder.
    pub privkey: Option<String>,
    /// Recipient of built transfers; the signer's own account when unset.
    pub transfer_to: Option<String>,
    /// Stats snapshot appended here on shutdown.
    pub stats_csv: Option<PathBuf>,
    pub pipeline: PipelineConfig,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Defaults to `limiter * 10000`.
    pub queue_capacity: Option<usize>,
    /// Defaults to `limiter`.
    pub workers: Option<usize>,
    pub backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_idle: usize,
    pub max_active: usize,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8999)),
            json_rpc: Vec::new(),
            rpc: Vec::new(),
            limiter: 1000,
            async_mode: false,
            privkey: None,
            transfer_to: None,
            stats_csv: None,
            pipeline: PipelineConfig::default(),
            pool: PoolConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        let defaults = PoolOptions::default();
        Self {
            max_idle: defaults.max_idle,
            max_active: defaults.max_active,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl GatewayConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| GatewayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.json_rpc.is_empty() && self.rpc.is_empty() {
            return Err(GatewayError::Config(
                "at least one json_rpc or rpc endpoint is required".to_string(),
            ));
        }
        if self.limiter == 0 {
            return Err(GatewayError::Config("limiter must be positive".to_string()));
        }
        if self.limiter > AdmissionLimiter::MAX_CAPACITY {
            return Err(GatewayError::Config(format!(
                "limiter must be at most {}",
                AdmissionLimiter::MAX_CAPACITY
            )));
        }
        if let Some(key) = &self.privkey {
            let bytes = hex::decode(key.trim().trim_start_matches("0x"))
                .map_err(|e| GatewayError::Config(format!("privkey: {}", e)))?;
            if bytes.len() != 32 {
                return Err(GatewayError::Config("privkey must be 32 bytes".to_string()));
            }
        }
        if self.pool.max_active == 0 || self.pool.max_active > Semaphore::MAX_PERMITS {
            return Err(GatewayError::Config(format!(
                "pool.max_active must be between 1 and {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if let Some(capacity) = self.pipeline.queue_capacity {
            if capacity == 0 || capacity > MAX_QUEUE_CAPACITY {
                return Err(GatewayError::Config(format!(
                    "pipeline.queue_capacity must be between 1 and {}",
                    MAX_QUEUE_CAPACITY
                )));
            }
        }
        if let Some(workers) = self.pipeline.workers {
            if workers == 0 || workers > MAX_WORKERS {
                return Err(GatewayError::Config(format!(
                    "pipeline.workers must be between 1 and {}",
                    MAX_WORKERS
                )));
            }
        }
        Ok(())
    }

    /// RPC endpoints first, then JSON endpoints.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.rpc
            .iter()
            .map(Endpoint::rpc)
            .chain(self.json_rpc.iter().map(Endpoint::json))
            .collect()
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_idle: self.pool.max_idle,
            max_active: self.pool.max_active,
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        let mut options = PipelineOptions::for_limiter(self.limiter);
        if let Some(capacity) = self.pipeline.queue_capacity {
            options.queue_capacity = capacity;
        }
        if let Some(workers) = self.pipeline.workers {
            options.workers = workers;
        }
        if let Some(ms) = self.pipeline.backoff_ms {
            options.backoff = Duration::from_millis(ms);
        }
        options
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.pool.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.pool.request_timeout_ms)
    }
}
