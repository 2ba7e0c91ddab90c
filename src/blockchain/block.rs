use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::hash::{meets_difficulty, sha256_hex};
use super::GENESIS_PREVIOUS_HASH;
use crate::patient::PatientRecord;

/// A single block in the ledger holding one patient record.
///
/// Serialized field order (`index, timestamp, data, previousHash, hash,
/// nonce`) is the snapshot format and must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: i64, // ms since epoch (UTC)
    pub data: PatientRecord,
    pub previous_hash: String,
    pub hash: String, // empty until mined
    pub nonce: u64,   // Proof-of-Work nonce
}

impl Block {
    /// Create the genesis block (first block in the chain).
    ///
    /// Its hash goes through the same pipeline as any other block but is not
    /// required to meet the difficulty.
    pub fn genesis() -> Self {
        let mut block = Self {
            index: 0,
            timestamp: Utc::now().timestamp_millis(),
            data: PatientRecord::genesis(),
            previous_hash: String::from(GENESIS_PREVIOUS_HASH),
            hash: String::new(),
            nonce: 0,
        };
        block.hash = block.compute_hash();
        block
    }

    /// Create a new block (not mined yet). Hand it to a `Miner` for PoW.
    pub fn new(index: u64, previous_hash: String, data: PatientRecord) -> Self {
        Self {
            index,
            timestamp: Utc::now().timestamp_millis(),
            data,
            previous_hash,
            hash: String::new(),
            nonce: 0,
        }
    }

    /// The hash preimage: `index:timestamp:data_json:previous_hash:nonce`.
    ///
    /// `data_json` is the compact JSON of the record in its declared field
    /// order, so the encoding never depends on how a caller built the value.
    pub fn canonical_encoding(&self) -> String {
        let data_json = serde_json::to_string(&self.data).expect("serialize patient record");
        format!(
            "{}:{}:{}:{}:{}",
            self.index, self.timestamp, data_json, self.previous_hash, self.nonce
        )
    }

    /// Compute the SHA-256 hash of this block (excluding the `hash` field).
    pub fn compute_hash(&self) -> String {
        sha256_hex(self.canonical_encoding().as_bytes())
    }

    /// Whether the cached `hash` matches the block's content.
    pub fn has_valid_hash(&self) -> bool {
        !self.hash.is_empty() && self.hash == self.compute_hash()
    }

    /// Validate that the block's cached `hash` matches its content and
    /// satisfies the PoW difficulty. (Does NOT validate chain linkage.)
    pub fn is_valid(&self, difficulty: u32) -> bool {
        self.has_valid_hash() && meets_difficulty(&self.hash, difficulty)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }
}
