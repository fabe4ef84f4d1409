mod common;

use common::eventually;
use ledger_ingress::network::testing::MockConnector;
use ledger_ingress::blockchain::Transaction;
use ledger_ingress::crypto::TxSigner;
use ledger_ingress::dispatch::PipelineOptions;
use ledger_ingress::http::{self, ReplyHeight, ReplyTx, ReplyTxHash};
use ledger_ingress::metrics::GatewayStats;
use ledger_ingress::{BlockInfo, Gateway, GatewayConfig};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Duration;

struct Harness {
    base: String,
    connector: Arc<MockConnector>,
    gateway: Arc<Gateway>,
    http: reqwest::Client,
}

impl Harness {
    async fn start(async_mode: bool) -> Self {
        let config = GatewayConfig::from_toml(
            r#"
            rpc = ["10.2.0.1:8802"]
            json_rpc = ["http://10.2.0.2:8801"]
            limiter = 2
            "#,
        )
        .unwrap();
        let connector = Arc::new(MockConnector::new());
        let pipeline = async_mode.then(|| PipelineOptions {
            queue_capacity: 128,
            workers: 2,
            backoff: Duration::from_millis(2),
        });
        let gateway = Arc::new(
            Gateway::new(
                connector.clone(),
                &config,
                TxSigner::generate(),
                config.limiter,
                pipeline,
                Arc::new(GatewayStats::new()),
            )
            .unwrap(),
        );

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let app = http::router(gateway.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            connector,
            gateway,
            http: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.http
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap()
    }

    async fn post_text(&self, path: &str, body: &str) -> reqwest::Response {
        self.http
            .post(format!("{}{}", self.base, path))
            .body(body.to_string())
            .send()
            .await
            .unwrap()
    }

    async fn post_json(&self, path: &str, body: Value) -> reqwest::Response {
        self.http
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn create(&self, is_transfer: bool, size: &str) -> String {
        let reply: ReplyTx = self
            .post_json("/createTx", json!({ "isTransfer": is_transfer, "size": size }))
            .await
            .json()
            .await
            .unwrap();
        reply.tx_content
    }
}

#[tokio::test]
async fn sync_send_round_trip() {
    let h = Harness::start(false).await;
    let hex_tx = h.create(false, "64").await;
    let expected = Transaction::from_hex(&hex_tx).unwrap().hash().unwrap();

    let resp = h.post_text("/sendTx", &hex_tx).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let reply: ReplyTxHash = resp.json().await.unwrap();
    assert_eq!(reply.id, expected.to_hex());

    let accepted: Value = h.get("/getTxCountAccepted").await.json().await.unwrap();
    assert_eq!(accepted["result"], "1");
    assert!(h.connector.accepted().contains(&expected));
}

#[tokio::test]
async fn async_send_is_acknowledged_then_delivered() {
    let h = Harness::start(true).await;
    let hex_tx = h.create(true, "").await;
    let expected = Transaction::from_hex(&hex_tx).unwrap().hash().unwrap();

    let reply: ReplyTxHash = h.post_text("/sendTx", &hex_tx).await.json().await.unwrap();
    assert_eq!(reply.id, expected.to_hex());

    let connector = h.connector.clone();
    assert!(eventually(Duration::from_secs(5), || connector.accepted().contains(&expected)).await);
    h.gateway.close().await;
}

#[tokio::test]
async fn sync_rejection_is_a_server_error() {
    let h = Harness::start(false).await;
    for url in ["10.2.0.1:8802", "http://10.2.0.2:8801"] {
        h.connector.node(url).reject_first(1);
    }
    let hex_tx = h.create(true, "").await;
    let resp = h.post_text("/sendTx", &hex_tx).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let accepted: Value = h.get("/getTxCountAccepted").await.json().await.unwrap();
    assert_eq!(accepted["result"], "0");
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    for async_mode in [false, true] {
        let h = Harness::start(async_mode).await;
        let resp = h.post_text("/sendTx", "0xzz").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("malformed"));
        assert_eq!(h.connector.sends(), 0);
    }
}

#[tokio::test]
async fn closed_pipeline_is_unavailable() {
    let h = Harness::start(true).await;
    let hex_tx = h.create(true, "").await;
    h.gateway.close().await;
    let resp = h.post_text("/sendTx", &hex_tx).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn read_routes() {
    let h = Harness::start(false).await;

    let height: ReplyHeight = h.get("/getBlockHeight").await.json().await.unwrap();
    assert_eq!(height.result, "12");

    let nodes: Value = h.get("/getNodeCount").await.json().await.unwrap();
    assert_eq!(nodes["result"], "3");

    let confirmed: Value = h.get("/getTxCountConfirmed").await.json().await.unwrap();
    assert_eq!(confirmed["result"], "120");

    let block: BlockInfo = h
        .post_json("/getBlockInfo", json!({ "height": "9" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(block.height, 9);
    assert_eq!(block.pre_hash, "0x0b");
    assert_eq!(block.create_time, "1700000000000000000");
    assert_eq!(block.tx_hash_list, vec!["0xaa".to_string(), "0xbb".to_string()]);

    let resp = h.post_json("/getBlockInfo", json!({ "height": "tip" })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let hex_tx = h.create(true, "").await;
    let sender = Transaction::from_hex(&hex_tx).unwrap().sender().unwrap();
    let balances: Value = h.post_text("/getBalance", &hex_tx).await.json().await.unwrap();
    assert_eq!(balances[0]["addr"], sender.as_str());
    assert_eq!(balances[0]["balance"], 100);

    let info = h.post_text("/getTxInfo", &hex_tx).await;
    assert_eq!(info.status(), StatusCode::OK);
    let info: ReplyTxHash = info.json().await.unwrap();
    assert!(info.id.starts_with("0x"));
}

#[tokio::test]
async fn oversized_write_is_a_bad_request() {
    let h = Harness::start(false).await;
    let resp = h
        .post_json("/createTx", json!({ "isTransfer": false, "size": "99999999" }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
