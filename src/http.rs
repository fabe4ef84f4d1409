//! HTTP surface of the gateway.
//!
//! Transaction bodies for `/sendTx`, `/getTxInfo` and `/getBalance` are raw
//! hex text (optional `0x`); the rest speak JSON.

use crate::error::GatewayError;
use crate::service::{BlockInfo, Gateway};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyHeight {
    pub result: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyNodeCount {
    pub result: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyAcceptedTxCount {
    pub result: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyConfirmedTxCount {
    pub result: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyTxHash {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyTx {
    pub tx_content: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxType {
    pub is_transfer: bool,
    #[serde(default)]
    pub size: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestH {
    pub height: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Decode(_) | GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::QueueFull | GatewayError::PipelineClosed => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("request failed: {}", self);
        } else {
            debug!("bad request: {}", self);
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, GatewayError>;

pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/getBlockHeight", get(block_height))
        .route("/getNodeCount", get(node_count))
        .route("/getTxCountAccepted", get(tx_accepted))
        .route("/getTxCountConfirmed", get(tx_confirmed))
        .route("/getTxInfo", post(tx_info))
        .route("/getBalance", post(balance))
        .route("/getBlockInfo", post(block_info))
        .route("/createTx", post(create_tx))
        .route("/sendTx", post(send_tx))
        .with_state(gateway)
}

async fn block_height(State(gateway): State<Arc<Gateway>>) -> ApiResult<ReplyHeight> {
    let height = gateway.block_height().await?;
    Ok(Json(ReplyHeight {
        result: height.to_string(),
    }))
}

async fn node_count(State(gateway): State<Arc<Gateway>>) -> ApiResult<ReplyNodeCount> {
    let count = gateway.node_count().await?;
    Ok(Json(ReplyNodeCount {
        result: count.to_string(),
    }))
}

async fn tx_accepted(State(gateway): State<Arc<Gateway>>) -> Json<ReplyAcceptedTxCount> {
    Json(ReplyAcceptedTxCount {
        result: gateway.tx_accepted().to_string(),
    })
}

async fn tx_confirmed(State(gateway): State<Arc<Gateway>>) -> ApiResult<ReplyConfirmedTxCount> {
    let count = gateway.tx_confirmed().await?;
    Ok(Json(ReplyConfirmedTxCount {
        result: count.to_string(),
    }))
}

async fn tx_info(State(gateway): State<Arc<Gateway>>, body: String) -> ApiResult<ReplyTxHash> {
    let hash = gateway.tx_info(&body).await?;
    Ok(Json(ReplyTxHash { id: hash.to_hex() }))
}

async fn balance(
    State(gateway): State<Arc<Gateway>>,
    body: String,
) -> ApiResult<Vec<crate::blockchain::AccountBalance>> {
    Ok(Json(gateway.balance(&body).await?))
}

async fn block_info(
    State(gateway): State<Arc<Gateway>>,
    Json(req): Json<RequestH>,
) -> ApiResult<BlockInfo> {
    Ok(Json(gateway.block_info(&req.height).await?))
}

async fn create_tx(
    State(gateway): State<Arc<Gateway>>,
    Json(req): Json<TxType>,
) -> ApiResult<ReplyTx> {
    let tx_content = gateway.create_tx(req.is_transfer, &req.size)?;
    Ok(Json(ReplyTx { tx_content }))
}

async fn send_tx(State(gateway): State<Arc<Gateway>>, body: String) -> ApiResult<ReplyTxHash> {
    let hash = gateway.send_tx(&body).await?;
    Ok(Json(ReplyTxHash { id: hash.to_hex() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_mapping() {
        assert_eq!(
            GatewayError::Decode("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::InvalidRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(GatewayError::QueueFull.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            GatewayError::PipelineClosed.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatewayError::Rejected("ErrTxExist".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::NoEndpoints.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn reply_field_names() {
        let tx = serde_json::to_value(ReplyTx {
            tx_content: "0x00".into(),
        })
        .unwrap();
        assert_eq!(tx["txContent"], "0x00");

        let req: TxType = serde_json::from_str(r#"{"isTransfer":false,"size":"32"}"#).unwrap();
        assert!(!req.is_transfer);
        assert_eq!(req.size, "32");

        let req: TxType = serde_json::from_str(r#"{"isTransfer":true}"#).unwrap();
        assert!(req.is_transfer);
    }
}
