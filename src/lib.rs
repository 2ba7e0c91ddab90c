//! Append-only patient ledger: blocks of patient records linked by SHA-256
//! hashes and sealed with a small Proof-of-Work, plus the HTTP surface and
//! snapshot store that sit around it.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod patient;
pub mod store;
