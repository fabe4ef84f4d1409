//! Transaction ingress gateway for a ledger network.
//!
//! Clients post signed transactions over HTTP; the gateway forwards them to a
//! set of ledger nodes either inline or through a rate-limited dispatch
//! pipeline that retries until a node accepts.

pub mod blockchain;
pub mod builder;
pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod metrics;
pub mod network;
pub mod service;

pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use service::{BlockInfo, Gateway};
