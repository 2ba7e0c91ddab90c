use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::debug;

use super::hash::meets_difficulty;
use super::{Block, LedgerError};

/// How many hashes to try between cancellation checks. Well below the
/// ~256 hashes a default-difficulty block needs.
pub const CHECK_EVERY: u64 = 64;

/// Shared handle between a running search and whoever started it.
#[derive(Debug, Default)]
pub struct MiningControl {
    cancelled: AtomicBool,
    attempts: AtomicU64,
}

impl MiningControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the search to stop at its next check.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Hashes tried so far (updated in batches).
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}

/// Proof-of-Work search at a fixed difficulty.
#[derive(Debug, Clone, Copy)]
pub struct Miner {
    difficulty: u32,
}

impl Miner {
    pub fn new(difficulty: u32) -> Self {
        Self { difficulty }
    }

    /// Find a nonce that yields a hash starting with `difficulty` zeros
    /// (in hex), counting up from the block's current nonce.
    pub fn mine(&self, block: &mut Block) {
        // nobody else holds this control, so the search always completes
        let _ = self.mine_with(block, &MiningControl::new());
    }

    /// Like [`Miner::mine`], but stops with `MiningCancelled` once `control`
    /// is cancelled. A cancelled block is left half-searched and must be
    /// dropped.
    pub fn mine_with(&self, block: &mut Block, control: &MiningControl) -> Result<(), LedgerError> {
        let mut tried: u64 = 0;
        loop {
            if tried % CHECK_EVERY == 0 {
                control.attempts.store(tried, Ordering::Relaxed);
                if control.is_cancelled() {
                    debug!(
                        "MINER - cancelled block #{} after {} attempts",
                        block.index, tried
                    );
                    return Err(LedgerError::MiningCancelled);
                }
            }

            block.hash = block.compute_hash();
            tried += 1;
            if meets_difficulty(&block.hash, self.difficulty) {
                control.attempts.store(tried, Ordering::Relaxed);
                return Ok(());
            }
            block.nonce = block.nonce.wrapping_add(1);
        }
    }
}
