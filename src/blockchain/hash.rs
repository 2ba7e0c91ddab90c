use sha2::{Digest, Sha256};

/// SHA-256 of `bytes` as lowercase hex (64 chars).
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Proof-of-Work predicate: the first `difficulty` hex chars are all `'0'`.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let wanted = difficulty as usize;
    hash.len() >= wanted && hash.chars().take(wanted).all(|c| c == '0')
}
