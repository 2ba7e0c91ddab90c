use chrono::Utc;
use log::{debug, info};
use serde::Serialize;

use super::hash::meets_difficulty;
use super::{Block, GENESIS_PREVIOUS_HASH, LedgerError, Miner};
use crate::patient::{PatientForm, PatientRecord};

/// In-memory patient ledger with Proof-of-Work.
///
/// Owned by a single writer; there is no internal locking.
#[derive(Debug, Clone)]
pub struct Blockchain {
    chain: Vec<Block>,
    difficulty: u32,
}

/// Summary counters for dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChainStats {
    pub total_blocks: usize,
    pub patient_records: usize,
    pub valid: bool,
}

impl Blockchain {
    /// Initialize a new blockchain with a genesis block.
    pub fn new(difficulty: u32) -> Self {
        Self {
            chain: vec![Block::genesis()],
            difficulty,
        }
    }

    /// Rebuild a ledger from the JSON array produced by [`Blockchain::to_json`].
    ///
    /// Malformed input is rejected; a well-formed but tampered chain loads
    /// fine and simply fails [`Blockchain::is_chain_valid`].
    pub fn from_json(json: &str, difficulty: u32) -> Result<Self, LedgerError> {
        let chain: Vec<Block> = serde_json::from_str(json)?;
        if chain.is_empty() {
            return Err(LedgerError::Deserialization(
                "snapshot holds no blocks".into(),
            ));
        }
        debug!("loaded ledger snapshot with {} block(s)", chain.len());
        Ok(Self { chain, difficulty })
    }

    /// Serialize the full block sequence.
    pub fn to_json(&self) -> Result<String, LedgerError> {
        Ok(serde_json::to_string(&self.chain)?)
    }

    /// Return the last block in the chain.
    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("Blockchain should always have at least the genesis block")
    }

    /// Build the next (unmined) block on top of the current tail.
    pub fn create_block(&self, data: PatientRecord) -> Block {
        let tail = self.last_block();
        Block::new(tail.index + 1, tail.hash.clone(), data)
    }

    /// Validate `form`, stamp it and build the candidate block for it.
    /// The ledger itself is not touched.
    pub fn prepare_block(&self, form: PatientForm) -> Result<Block, LedgerError> {
        let record = form.into_record(Utc::now().timestamp_millis())?;
        Ok(self.create_block(record))
    }

    /// Validate, mine and append a patient record.
    pub fn add_block(&mut self, form: PatientForm) -> Result<&Block, LedgerError> {
        let mut block = self.prepare_block(form)?;
        Miner::new(self.difficulty).mine(&mut block);
        self.append_mined_block(block)
    }

    /// Append a block mined elsewhere. It must extend the current tail and
    /// carry a valid hash at this ledger's difficulty.
    pub fn append_mined_block(&mut self, block: Block) -> Result<&Block, LedgerError> {
        let tail = self.last_block();
        if block.previous_hash != tail.hash || block.index != tail.index + 1 {
            return Err(LedgerError::StaleBlock {
                expected: tail.hash.clone(),
                found: block.previous_hash,
            });
        }
        if !block.has_valid_hash() {
            return Err(LedgerError::InvalidBlock("hash does not match content".into()));
        }
        if !meets_difficulty(&block.hash, self.difficulty) {
            return Err(LedgerError::InvalidBlock(format!(
                "hash does not meet difficulty {}",
                self.difficulty
            )));
        }

        info!(
            "sealed block #{} for patient {} (hash={}, nonce={})",
            block.index, block.data.id, block.hash, block.nonce
        );
        self.chain.push(block);
        Ok(self.last_block())
    }

    /// Validate the entire chain: linkage, hashes and PoW.
    /// Stops at the first violation.
    pub fn is_chain_valid(&self) -> bool {
        // Validate genesis block immutability (exempt from PoW)
        let Some(genesis) = self.chain.first() else {
            return false;
        };
        if genesis.index != 0
            || genesis.previous_hash != GENESIS_PREVIOUS_HASH
            || !genesis.has_valid_hash()
        {
            return false;
        }

        // Validate the rest of the chain
        self.chain.windows(2).enumerate().all(|(i, pair)| {
            let (prev, current) = (&pair[0], &pair[1]);
            current.index == i as u64 + 1
                && current.previous_hash == prev.hash
                && current.is_valid(self.difficulty)
        })
    }

    /// Patient records of every block after genesis, in chain order.
    pub fn patients(&self) -> impl Iterator<Item = &PatientRecord> {
        self.chain.iter().skip(1).map(|b| &b.data)
    }

    /// Discard all history and start over from a fresh genesis block.
    pub fn reset(&mut self) {
        info!("resetting ledger ({} block(s) discarded)", self.chain.len());
        self.chain = vec![Block::genesis()];
    }

    pub fn stats(&self) -> ChainStats {
        ChainStats {
            total_blocks: self.len(),
            patient_records: self.len() - 1,
            valid: self.is_chain_valid(),
        }
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Never true: a ledger always holds its genesis block.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }
}
