pub mod block;
pub mod error;
pub mod hash;
pub mod miner;
pub mod model;

pub use block::Block;
pub use error::LedgerError;
pub use miner::{Miner, MiningControl};
pub use model::{Blockchain, ChainStats};

/// Default Proof-of-Work difficulty (number of leading zeros).
pub const DEFAULT_DIFFICULTY: u32 = 2;

/// Difficulty bounds (keep low in dev to avoid long waits)
pub const DIFF_MIN: u32 = 1;
pub const DIFF_MAX: u32 = 6;

/// `previousHash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";
