use sha2::{Digest, Sha256};

fn short_hash(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("0x{}", hex::encode(&digest[..20]))
}

/// Account address for an ed25519 public key.
pub fn address_from_pubkey(pubkey: &[u8]) -> String {
    short_hash(pubkey)
}

/// Address of a named executor contract, e.g. `coins`.
pub fn exec_address(name: &str) -> String {
    let mut data = b"exec:".to_vec();
    data.extend_from_slice(name.as_bytes());
    short_hash(&data)
}
