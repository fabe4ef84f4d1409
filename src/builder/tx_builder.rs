use super::template::TemplatePool;
use crate::blockchain::{Transaction, TRANSFER_EXECER, WRITE_EXECER, exec_address};
use crate::crypto::TxSigner;
use crate::error::{GatewayError, Result};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

pub const FEE: i64 = 1_000_000;
pub const TRANSFER_AMOUNT: i64 = 1;
pub const MAX_WRITE_SIZE: usize = 1024 * 1024;

const LETTERS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ123456789-=_+=/<>!@#$%^&";

const POOLED_TEMPLATES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    Transfer,
    Write { size: usize },
}

/// Payload of a `coins` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoinsAction {
    Transfer {
        amount: i64,
        note: Vec<u8>,
        to: String,
    },
}

fn transfer_template() -> Transaction {
    Transaction::new(TRANSFER_EXECER, Vec::new())
}

fn write_template() -> Transaction {
    Transaction::new(WRITE_EXECER, Vec::new())
}

/// Builds self-signed synthetic transactions for load testing.
///
/// Every build gets a fresh nonce (random high half, sequence low half), so
/// consecutive builds with the same parameters never encode identically.
pub struct TxBuilder {
    signer: TxSigner,
    transfer_to: String,
    transfers: TemplatePool<Transaction>,
    writes: TemplatePool<Transaction>,
    rng: Mutex<StdRng>,
    seq: AtomicU32,
}

impl TxBuilder {
    /// `transfer_to` defaults to the signer's own account.
    pub fn new(signer: TxSigner, transfer_to: Option<String>) -> Self {
        let transfer_to = transfer_to.unwrap_or_else(|| signer.address());
        Self {
            signer,
            transfer_to,
            transfers: TemplatePool::new(POOLED_TEMPLATES, transfer_template),
            writes: TemplatePool::new(POOLED_TEMPLATES, write_template),
            rng: Mutex::new(StdRng::from_entropy()),
            seq: AtomicU32::new(0),
        }
    }

    pub fn signer_address(&self) -> String {
        self.signer.address()
    }

    fn next_nonce(&self) -> i64 {
        let high = self.rng.lock().next_u32() as u64;
        let low = self.seq.fetch_add(1, Ordering::Relaxed) as u64;
        ((high << 32) | low) as i64
    }

    fn fill_random(&self, buf: &mut Vec<u8>, size: usize) {
        let mut rng = self.rng.lock();
        buf.reserve(size);
        buf.extend((0..size).map(|_| LETTERS[rng.gen_range(0..LETTERS.len())]));
    }

    /// Signed, encoded transaction bytes.
    pub fn build(&self, kind: TxKind) -> Result<Vec<u8>> {
        match kind {
            TxKind::Transfer => {
                let mut tx = self.transfers.get();
                let action = CoinsAction::Transfer {
                    amount: TRANSFER_AMOUNT,
                    note: Vec::new(),
                    to: self.transfer_to.clone(),
                };
                bincode::serialize_into(&mut tx.payload, &action)
                    .map_err(|e| GatewayError::Signing(e.to_string()))?;
                tx.fee = FEE;
                tx.to.push_str(&self.transfer_to);
                tx.nonce = self.next_nonce();
                self.signer.sign(&mut tx)?;
                tx.encode()
            }
            TxKind::Write { size } => {
                if size > MAX_WRITE_SIZE {
                    return Err(GatewayError::InvalidRequest(format!(
                        "write payload of {} bytes exceeds {}",
                        size, MAX_WRITE_SIZE
                    )));
                }
                let mut tx = self.writes.get();
                self.fill_random(&mut tx.payload, size);
                tx.fee = FEE;
                tx.to = exec_address(WRITE_EXECER);
                tx.nonce = self.next_nonce();
                self.signer.sign(&mut tx)?;
                tx.encode()
            }
        }
    }

    pub fn build_hex(&self, kind: TxKind) -> Result<String> {
        Ok(format!("0x{}", hex::encode(self.build(kind)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn builder() -> TxBuilder {
        TxBuilder::new(TxSigner::generate(), None)
    }

    #[test]
    fn identical_parameters_give_distinct_transactions() {
        let builder = builder();
        for kind in [
            TxKind::Transfer,
            TxKind::Write { size: 0 },
            TxKind::Write { size: 32 },
        ] {
            let a = Transaction::decode(&builder.build(kind).unwrap()).unwrap();
            let b = Transaction::decode(&builder.build(kind).unwrap()).unwrap();
            assert_ne!(a.hash().unwrap(), b.hash().unwrap(), "{:?}", kind);
        }
    }

    #[test]
    fn transfer_is_signed_by_the_funding_account() {
        let builder = builder();
        let tx = Transaction::decode(&builder.build(TxKind::Transfer).unwrap()).unwrap();
        assert_eq!(tx.executor(), TRANSFER_EXECER);
        assert_eq!(tx.fee, FEE);
        assert_eq!(tx.sender().unwrap(), builder.signer_address());
        let action: CoinsAction = bincode::deserialize(&tx.payload).unwrap();
        assert_eq!(
            action,
            CoinsAction::Transfer {
                amount: TRANSFER_AMOUNT,
                note: Vec::new(),
                to: builder.signer_address(),
            }
        );
    }

    #[test]
    fn write_payload_has_requested_size() {
        let builder = builder();
        let tx = Transaction::decode(&builder.build(TxKind::Write { size: 500 }).unwrap()).unwrap();
        assert_eq!(tx.executor(), WRITE_EXECER);
        assert_eq!(tx.payload.len(), 500);
        assert!(tx.payload.iter().all(|b| LETTERS.contains(b)));
    }

    #[test]
    fn reused_templates_do_not_leak_state() {
        let builder = builder();
        builder.build(TxKind::Write { size: 64 }).unwrap();
        let tx = Transaction::decode(&builder.build(TxKind::Write { size: 8 }).unwrap()).unwrap();
        assert_eq!(tx.payload.len(), 8);

        builder.build(TxKind::Transfer).unwrap();
        let tx = Transaction::decode(&builder.build(TxKind::Transfer).unwrap()).unwrap();
        assert_eq!(tx.to, builder.signer_address());
    }

    #[test]
    fn oversized_write_is_refused() {
        let builder = builder();
        assert!(matches!(
            builder.build(TxKind::Write {
                size: MAX_WRITE_SIZE + 1
            }),
            Err(GatewayError::InvalidRequest(_))
        ));
    }

    #[test]
    fn concurrent_builds_are_unique() {
        let builder = Arc::new(builder());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let builder = builder.clone();
                std::thread::spawn(move || {
                    (0..200)
                        .map(|_| builder.build(TxKind::Write { size: 4 }).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut seen = HashSet::new();
        for handle in handles {
            for bytes in handle.join().unwrap() {
                assert!(seen.insert(bytes));
            }
        }
        assert_eq!(seen.len(), 1600);
    }
}
