//! Remote-procedure transport: length-prefixed bincode frames over TCP.

use super::gateway::LedgerNode;
use crate::blockchain::{
    AccountBalance, BlockOverview, Header, PeerInfo, SendReply, Transaction, TransactionDetail,
    TxHash,
};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{Duration, timeout};

pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcRequest {
    SendTransaction(Transaction),
    QueryTransaction(TxHash),
    GetBalance {
        addresses: Vec<String>,
        execer: String,
    },
    GetLastHeader,
    GetPeerInfo,
    GetBlockByHeight(i64),
    GetTotalTxCount(i64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcResponse {
    Reply(SendReply),
    Detail(TransactionDetail),
    Balances(Vec<AccountBalance>),
    Header(Header),
    Peers(Vec<PeerInfo>),
    Block(BlockOverview),
    TxCount(i64),
    Error(String),
}

pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = bincode::serialize(value).map_err(|e| GatewayError::Transport(e.to_string()))?;
    if body.len() > MAX_FRAME_LEN {
        return Err(GatewayError::Transport(format!(
            "frame of {} bytes exceeds limit",
            body.len()
        )));
    }
    writer.write_u32(body.len() as u32).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_LEN {
        return Err(GatewayError::Transport(format!(
            "frame of {} bytes exceeds limit",
            len
        )));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    bincode::deserialize(&body).map_err(|e| GatewayError::Transport(e.to_string()))
}

/// One TCP stream to a ledger node. Calls are serialized on the stream; the
/// stream is dropped on any failure and re-dialed by the next call.
pub struct RpcClient {
    addr: String,
    stream: Mutex<Option<TcpStream>>,
    request_timeout: Duration,
}

impl RpcClient {
    /// Handle that dials on first use.
    pub fn lazy(addr: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            stream: Mutex::new(None),
            request_timeout,
        }
    }

    pub async fn connect(
        addr: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let addr = addr.into();
        let stream = match timeout(connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(GatewayError::Transport(format!("{}: {}", addr, e))),
            Err(_) => {
                return Err(GatewayError::Transport(format!(
                    "{}: connect timed out",
                    addr
                )));
            }
        };
        stream.set_nodelay(true)?;
        Ok(Self {
            addr,
            stream: Mutex::new(Some(stream)),
            request_timeout,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn call(&self, request: RpcRequest) -> Result<RpcResponse> {
        let mut slot = self.stream.lock().await;
        let stream = slot.take();
        let exchange = Self::exchange(&self.addr, stream, &request);
        match timeout(self.request_timeout, exchange).await {
            Ok(Ok((stream, RpcResponse::Error(msg)))) => {
                *slot = Some(stream);
                Err(GatewayError::Transport(format!("{}: {}", self.addr, msg)))
            }
            Ok(Ok((stream, response))) => {
                *slot = Some(stream);
                Ok(response)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(GatewayError::Transport(format!(
                "{}: request timed out",
                self.addr
            ))),
        }
    }

    async fn exchange(
        addr: &str,
        stream: Option<TcpStream>,
        request: &RpcRequest,
    ) -> Result<(TcpStream, RpcResponse)> {
        let mut stream = match stream {
            Some(stream) => stream,
            None => TcpStream::connect(addr)
                .await
                .map_err(|e| GatewayError::Transport(format!("{}: {}", addr, e)))?,
        };
        write_frame(&mut stream, request)
            .await
            .map_err(|e| transport(addr, e))?;
        let response = read_frame(&mut stream)
            .await
            .map_err(|e| transport(addr, e))?;
        Ok((stream, response))
    }
}

fn transport(addr: &str, err: GatewayError) -> GatewayError {
    match err {
        GatewayError::Transport(msg) => GatewayError::Transport(format!("{}: {}", addr, msg)),
        other => GatewayError::Transport(format!("{}: {}", addr, other)),
    }
}

fn unexpected(addr: &str, response: RpcResponse) -> GatewayError {
    GatewayError::Transport(format!("{}: unexpected response {:?}", addr, response))
}

#[async_trait]
impl LedgerNode for RpcClient {
    async fn send_transaction(&self, tx: &Transaction) -> Result<SendReply> {
        match self.call(RpcRequest::SendTransaction(tx.clone())).await? {
            RpcResponse::Reply(reply) => Ok(reply),
            other => Err(unexpected(&self.addr, other)),
        }
    }

    async fn query_transaction(&self, hash: &TxHash) -> Result<TransactionDetail> {
        match self.call(RpcRequest::QueryTransaction(*hash)).await? {
            RpcResponse::Detail(detail) => Ok(detail),
            other => Err(unexpected(&self.addr, other)),
        }
    }

    async fn get_balance(
        &self,
        addresses: &[String],
        execer: &str,
    ) -> Result<Vec<AccountBalance>> {
        let request = RpcRequest::GetBalance {
            addresses: addresses.to_vec(),
            execer: execer.to_string(),
        };
        match self.call(request).await? {
            RpcResponse::Balances(balances) => Ok(balances),
            other => Err(unexpected(&self.addr, other)),
        }
    }

    async fn get_last_header(&self) -> Result<Header> {
        match self.call(RpcRequest::GetLastHeader).await? {
            RpcResponse::Header(header) => Ok(header),
            other => Err(unexpected(&self.addr, other)),
        }
    }

    async fn get_peer_info(&self) -> Result<Vec<PeerInfo>> {
        match self.call(RpcRequest::GetPeerInfo).await? {
            RpcResponse::Peers(peers) => Ok(peers),
            other => Err(unexpected(&self.addr, other)),
        }
    }

    async fn get_block_by_height(&self, height: i64) -> Result<BlockOverview> {
        match self.call(RpcRequest::GetBlockByHeight(height)).await? {
            RpcResponse::Block(block) => Ok(block),
            other => Err(unexpected(&self.addr, other)),
        }
    }

    async fn get_total_tx_count(&self, height: i64) -> Result<i64> {
        match self.call(RpcRequest::GetTotalTxCount(height)).await? {
            RpcResponse::TxCount(count) => Ok(count),
            other => Err(unexpected(&self.addr, other)),
        }
    }
}
