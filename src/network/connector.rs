use super::gateway::{Connector, Endpoint, LedgerNode, Transport};
use super::jsonrpc::JsonRpcClient;
use super::rpc::RpcClient;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Duration;

/// Connector for both transports. RPC connections are dialed eagerly so a
/// dead node fails the checkout; JSON handles are stateless.
pub struct NodeConnector {
    http: reqwest::Client,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl NodeConnector {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("http client: {}", e)))?;
        Ok(Self {
            http,
            connect_timeout,
            request_timeout,
        })
    }
}

#[async_trait]
impl Connector for NodeConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn LedgerNode>> {
        match endpoint.transport {
            Transport::Rpc => {
                let client =
                    RpcClient::connect(&endpoint.url, self.connect_timeout, self.request_timeout)
                        .await?;
                Ok(Arc::new(client))
            }
            Transport::Json => Ok(Arc::new(JsonRpcClient::new(
                &endpoint.url,
                self.http.clone(),
            ))),
        }
    }

    fn handle(&self, endpoint: &Endpoint) -> Arc<dyn LedgerNode> {
        match endpoint.transport {
            Transport::Rpc => Arc::new(RpcClient::lazy(&endpoint.url, self.request_timeout)),
            Transport::Json => Arc::new(JsonRpcClient::new(&endpoint.url, self.http.clone())),
        }
    }
}
