//! JSON request/response transport.

use super::gateway::LedgerNode;
use crate::blockchain::{
    AccountBalance, BlockOverview, Header, PeerInfo, SendReply, Transaction, TransactionDetail,
    TxHash,
};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Serialize)]
struct JsonRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PeerList {
    #[serde(default)]
    peers: Vec<PeerInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TotalTxCount {
    tx_count: i64,
}

/// Stateless JSON-RPC handle; safe to share across tasks.
#[derive(Clone)]
pub struct JsonRpcClient {
    url: String,
    http: reqwest::Client,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            http,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call_raw(&self, method: &str, params: Vec<Value>) -> Result<JsonResponse> {
        let request = JsonRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<JsonResponse>().await?)
    }

    /// A non-null `error` is a rejection; a result that is not a hash is a
    /// transport failure, never the caller's fault.
    fn send_reply(&self, response: JsonResponse) -> Result<SendReply> {
        if let Some(err) = response.error.filter(|e| !e.is_null()) {
            return Ok(SendReply::rejected(error_text(&err)));
        }
        match response.result {
            Some(Value::String(hash)) => TxHash::from_hex(&hash)
                .map(SendReply::accepted)
                .map_err(|e| GatewayError::Transport(format!("{}: send result: {}", self.url, e))),
            other => Err(GatewayError::Transport(format!(
                "{}: unexpected send result {:?}",
                self.url, other
            ))),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        let response = self.call_raw(method, params).await?;
        if let Some(err) = response.error.filter(|e| !e.is_null()) {
            return Err(GatewayError::Transport(format!(
                "{} {}: {}",
                self.url,
                method,
                error_text(&err)
            )));
        }
        let result = response.result.unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| GatewayError::Transport(format!("{} {}: {}", self.url, method, e)))
    }
}

fn error_text(err: &Value) -> String {
    match err {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl LedgerNode for JsonRpcClient {
    async fn send_transaction(&self, tx: &Transaction) -> Result<SendReply> {
        let params = vec![json!({ "data": tx.to_hex()? })];
        let response = self.call_raw("Chain33.SendTransaction", params).await?;
        self.send_reply(response)
    }

    async fn query_transaction(&self, hash: &TxHash) -> Result<TransactionDetail> {
        self.call(
            "Chain33.QueryTransaction",
            vec![json!({ "hash": hash.to_hex() })],
        )
        .await
    }

    async fn get_balance(
        &self,
        addresses: &[String],
        execer: &str,
    ) -> Result<Vec<AccountBalance>> {
        self.call(
            "Chain33.GetBalance",
            vec![json!({ "addresses": addresses, "execer": execer })],
        )
        .await
    }

    async fn get_last_header(&self) -> Result<Header> {
        self.call("Chain33.GetLastHeader", vec![]).await
    }

    async fn get_peer_info(&self) -> Result<Vec<PeerInfo>> {
        let list: PeerList = self.call("Chain33.GetPeerInfo", vec![]).await?;
        Ok(list.peers)
    }

    async fn get_block_by_height(&self, height: i64) -> Result<BlockOverview> {
        self.call(
            "Chain33.GetBlockOverview",
            vec![json!({ "height": height })],
        )
        .await
    }

    async fn get_total_tx_count(&self, height: i64) -> Result<i64> {
        let total: TotalTxCount = self
            .call("Chain33.QueryTotalFee", vec![json!({ "height": height })])
            .await?;
        Ok(total.tx_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let request = JsonRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "Chain33.GetLastHeader",
            params: vec![],
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["method"], "Chain33.GetLastHeader");
        assert!(body["params"].as_array().unwrap().is_empty());
    }

    #[test]
    fn response_with_null_error_parses() {
        let raw = r#"{"id":1,"result":{"height":5,"hash":"0x1","parentHash":"0x0","blockTime":10,"txCount":2},"error":null}"#;
        let response: JsonResponse = serde_json::from_str(raw).unwrap();
        assert!(response.error.unwrap_or(Value::Null).is_null());
        let header: Header = serde_json::from_value(response.result.unwrap()).unwrap();
        assert_eq!(header.height, 5);
        assert_eq!(header.tx_count, 2);
    }

    fn send_response(raw: &str) -> Result<SendReply> {
        let client = JsonRpcClient::new("http://node:8801", reqwest::Client::new());
        client.send_reply(serde_json::from_str(raw).unwrap())
    }

    #[test]
    fn send_result_shapes() {
        let hash = format!("0x{}", "ab".repeat(32));
        let reply = send_response(&format!(r#"{{"result":"{}","error":null}}"#, hash)).unwrap();
        assert!(reply.is_ok);
        assert_eq!(reply.msg, vec![0xab; 32]);

        let reply = send_response(r#"{"result":null,"error":"ErrTxExist"}"#).unwrap();
        assert!(!reply.is_ok);
        assert_eq!(reply.message(), "ErrTxExist");
    }

    #[test]
    fn malformed_send_result_is_transport_error() {
        for raw in [
            r#"{"result":"0x1234","error":null}"#,
            r#"{"result":"not-hex","error":null}"#,
            r#"{"result":7,"error":null}"#,
        ] {
            let err = send_response(raw).unwrap_err();
            assert!(matches!(err, GatewayError::Transport(_)), "{}", raw);
            assert!(err.is_retryable());
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let client = JsonRpcClient::new("http://127.0.0.1:1", reqwest::Client::new());
        let err = client.get_last_header().await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }
}
