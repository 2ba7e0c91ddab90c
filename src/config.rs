use std::env;
use std::path::PathBuf;

use log::warn;

use crate::blockchain::{DEFAULT_DIFFICULTY, DIFF_MAX, DIFF_MIN};

/// Runtime settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub difficulty: u32,
    pub ledger_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            difficulty: DEFAULT_DIFFICULTY,
            ledger_path: PathBuf::from("data/patient_blockchain.json"),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values fall back to
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);
        let port: u16 = lookup("PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let difficulty = match lookup("DIFFICULTY").map(|v| v.parse::<u32>()) {
            None => defaults.difficulty,
            Some(Ok(d)) if (DIFF_MIN..=DIFF_MAX).contains(&d) => d,
            Some(Ok(d)) => {
                let clamped = d.clamp(DIFF_MIN, DIFF_MAX);
                warn!("DIFFICULTY={d} out of range, using {clamped}");
                clamped
            }
            Some(Err(_)) => {
                warn!("DIFFICULTY is not a number, using {}", defaults.difficulty);
                defaults.difficulty
            }
        };

        let ledger_path = lookup("LEDGER_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.ledger_path);

        Self {
            host,
            port,
            difficulty,
            ledger_path,
        }
    }
}
