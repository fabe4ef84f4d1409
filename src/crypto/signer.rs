use crate::blockchain::transaction::ED25519;
use crate::blockchain::{Signature, Transaction, address_from_pubkey};
use crate::error::{GatewayError, Result};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;

/// Ed25519 key used to sign locally built transactions.
pub struct TxSigner {
    key: SigningKey,
}

impl TxSigner {
    pub fn from_hex(secret: &str) -> Result<Self> {
        let bytes = hex::decode(secret.trim().trim_start_matches("0x"))
            .map_err(|e| GatewayError::Config(format!("privkey: {}", e)))?;
        let seed = <[u8; 32]>::try_from(bytes.as_slice())
            .map_err(|_| GatewayError::Config("privkey must be 32 bytes".to_string()))?;
        Ok(Self {
            key: SigningKey::from_bytes(&seed),
        })
    }

    pub fn generate() -> Self {
        let mut csprng = OsRng;
        Self {
            key: SigningKey::generate(&mut csprng),
        }
    }

    pub fn public_key(&self) -> Vec<u8> {
        self.key.verifying_key().to_bytes().to_vec()
    }

    pub fn address(&self) -> String {
        address_from_pubkey(&self.public_key())
    }

    /// Signs the unsigned encoding of `tx` and attaches the signature.
    pub fn sign(&self, tx: &mut Transaction) -> Result<()> {
        tx.signature = None;
        let message = tx.encode()?;
        let signature = self.key.sign(&message).to_bytes().to_vec();
        tx.signature = Some(Signature {
            ty: ED25519,
            pubkey: self.public_key(),
            signature,
        });
        Ok(())
    }
}
