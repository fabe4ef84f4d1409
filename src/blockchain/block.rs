use super::transaction::{Transaction, TxHash};
use serde::{Deserialize, Serialize};

/// Acknowledgment returned by a ledger node for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReply {
    pub is_ok: bool,
    pub msg: Vec<u8>,
}

impl SendReply {
    pub fn accepted(hash: TxHash) -> Self {
        Self {
            is_ok: true,
            msg: hash.0.to_vec(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            is_ok: false,
            msg: reason.into().into_bytes(),
        }
    }

    pub fn message(&self) -> String {
        String::from_utf8_lossy(&self.msg).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub height: i64,
    pub hash: String,
    pub parent_hash: String,
    pub block_time: i64,
    pub tx_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub addr: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub addr: String,
    pub balance: i64,
    pub frozen: i64,
    pub currency: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetail {
    pub tx: Transaction,
    pub height: i64,
    pub index: i64,
    pub block_time: i64,
}

/// A block header together with the hashes of the transactions it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockOverview {
    pub head: Header,
    pub tx_hashes: Vec<String>,
}
