use super::address::address_from_pubkey;
use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub const TRANSFER_EXECER: &str = "coins";
pub const WRITE_EXECER: &str = "user.write";

/// Signature scheme tag carried in [`Signature::ty`].
pub const ED25519: i32 = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub ty: i32,
    pub pubkey: Vec<u8>,
    pub signature: Vec<u8>,
}

/// A signed, encoded ledger transaction. The gateway never interprets the
/// payload beyond the executor name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub execer: Vec<u8>,
    pub payload: Vec<u8>,
    pub signature: Option<Signature>,
    pub fee: i64,
    pub expire: i64,
    pub nonce: i64,
    pub to: String,
}

/// Content hash of a transaction (SHA-256 of its unsigned encoding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim().trim_start_matches("0x"))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| GatewayError::Decode("hash must be 32 bytes".to_string()))?;
        Ok(TxHash(arr))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Transaction {
    pub fn new(execer: &str, payload: Vec<u8>) -> Self {
        Self {
            execer: execer.as_bytes().to_vec(),
            payload,
            ..Default::default()
        }
    }

    pub fn executor(&self) -> String {
        String::from_utf8_lossy(&self.execer).into_owned()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| GatewayError::Signing(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(GatewayError::Decode("empty transaction".to_string()));
        }
        let tx: Transaction = bincode::deserialize(bytes)?;
        if tx.execer.is_empty() {
            return Err(GatewayError::Decode("missing executor".to_string()));
        }
        Ok(tx)
    }

    /// Decodes hex-encoded transaction bytes, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim().trim_start_matches("0x"))?;
        Self::decode(&bytes)
    }

    pub fn to_hex(&self) -> Result<String> {
        Ok(format!("0x{}", hex::encode(self.encode()?)))
    }

    /// Bytes covered by the signature: the encoding with the signature cleared.
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        if self.signature.is_none() {
            return self.encode();
        }
        let mut unsigned = self.clone();
        unsigned.signature = None;
        unsigned.encode()
    }

    pub fn hash(&self) -> Result<TxHash> {
        let digest = Sha256::digest(self.signing_bytes()?);
        Ok(TxHash(digest.into()))
    }

    /// Sender address derived from the signing public key.
    pub fn sender(&self) -> Result<String> {
        match &self.signature {
            Some(sig) if !sig.pubkey.is_empty() => Ok(address_from_pubkey(&sig.pubkey)),
            _ => Err(GatewayError::Decode("transaction is not signed".to_string())),
        }
    }

    /// Clears everything but the executor so a template can be reused.
    pub fn reset(&mut self) {
        self.payload.clear();
        self.signature = None;
        self.fee = 0;
        self.expire = 0;
        self.nonce = 0;
        self.to.clear();
    }
}
