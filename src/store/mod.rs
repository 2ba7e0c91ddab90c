//! Key-value persistence for ledger snapshots.
//!
//! The ledger only produces and consumes JSON strings; where they live is
//! decided here.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, info, warn};

use crate::blockchain::Blockchain;

/// A single-key snapshot slot.
pub trait SnapshotStore: Send + Sync {
    /// The stored snapshot, or `None` if nothing was saved yet.
    fn load(&self) -> io::Result<Option<String>>;
    fn save(&self, snapshot: &str) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

/// Snapshot kept in one JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileStore {
    fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write to a sibling temp file, then rename over the old snapshot.
    fn save(&self, snapshot: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, snapshot)?;
        fs::rename(&tmp, &self.path)?;
        debug!("snapshot saved to {} ({} bytes)", self.path.display(), snapshot.len());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// In-process store, handy for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(snapshot.into())),
        }
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self.slot.lock().expect("mutex poisoned").clone())
    }

    fn save(&self, snapshot: &str) -> io::Result<()> {
        *self.slot.lock().expect("mutex poisoned") = Some(snapshot.to_string());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        *self.slot.lock().expect("mutex poisoned") = None;
        Ok(())
    }
}

/// Restore the ledger from `store`, or start a fresh one when the snapshot
/// is absent, unreadable or malformed.
pub fn load_or_fresh(store: &dyn SnapshotStore, difficulty: u32) -> Blockchain {
    match store.load() {
        Ok(Some(json)) => match Blockchain::from_json(&json, difficulty) {
            Ok(bc) => {
                info!("restored ledger with {} block(s)", bc.len());
                if !bc.is_chain_valid() {
                    warn!("restored ledger fails integrity validation");
                }
                bc
            }
            Err(e) => {
                warn!("{e}; starting a fresh ledger");
                Blockchain::new(difficulty)
            }
        },
        Ok(None) => {
            info!("no ledger snapshot found; starting a fresh ledger");
            Blockchain::new(difficulty)
        }
        Err(e) => {
            warn!("could not read ledger snapshot: {e}; starting a fresh ledger");
            Blockchain::new(difficulty)
        }
    }
}

/// Persist `bc`; failures are logged, not propagated.
pub fn persist(store: &dyn SnapshotStore, bc: &Blockchain) {
    let result = bc
        .to_json()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        .and_then(|json| store.save(&json));
    if let Err(e) = result {
        warn!("could not persist ledger snapshot: {e}");
    }
}
