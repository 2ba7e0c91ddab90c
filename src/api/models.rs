use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

use crate::blockchain::{Block, Blockchain, ChainStats, LedgerError, MiningControl};
use crate::patient::PatientRecord;
use crate::store::SnapshotStore;

/// Shared application state: the ledger, its mining jobs and where
/// snapshots go.
pub struct AppState {
    pub blockchain: Mutex<Blockchain>,
    pub jobs: Mutex<HashMap<Uuid, MiningJob>>,
    pub store: Box<dyn SnapshotStore>,
}

impl AppState {
    pub fn new(blockchain: Blockchain, store: Box<dyn SnapshotStore>) -> Self {
        Self {
            blockchain: Mutex::new(blockchain),
            jobs: Mutex::new(HashMap::new()),
            store,
        }
    }

    /// Id of the job currently mining, if any.
    pub fn active_job(&self) -> Option<Uuid> {
        let jobs = self.jobs.lock().expect("mutex poisoned");
        jobs.values()
            .find(|j| matches!(j.status, JobStatus::Mining))
            .map(|j| j.id)
    }
}

/* ---------- Mining jobs ---------- */

/// Finished jobs kept around for polling; older ones are forgotten.
pub const KEEP_SETTLED_JOBS: usize = 16;

/// One submitted patient record being mined off the request path.
pub struct MiningJob {
    pub id: Uuid,
    pub patient_id: String,
    pub index: u64,
    pub submitted: Instant,
    pub control: Arc<MiningControl>,
    pub status: JobStatus,
}

/// Drop the oldest settled jobs until at most `keep` remain. Mining jobs
/// are never dropped.
pub fn forget_settled_jobs(jobs: &mut HashMap<Uuid, MiningJob>, keep: usize) {
    let mut settled: Vec<(Instant, Uuid)> = jobs
        .values()
        .filter(|j| !matches!(j.status, JobStatus::Mining))
        .map(|j| (j.submitted, j.id))
        .collect();
    if settled.len() <= keep {
        return;
    }
    settled.sort_unstable();
    let excess = settled.len() - keep;
    for (_, id) in settled.into_iter().take(excess) {
        jobs.remove(&id);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Mining,
    Mined { hash: String, nonce: u64 },
    Cancelled,
    Failed { reason: String },
}

#[derive(Serialize)]
pub struct JobResponse {
    pub job_id: Uuid,
    pub patient_id: String,
    pub index: u64,
    pub attempts: u64,
    #[serde(flatten)]
    pub status: JobStatus,
}

impl From<&MiningJob> for JobResponse {
    fn from(job: &MiningJob) -> Self {
        Self {
            job_id: job.id,
            patient_id: job.patient_id.clone(),
            index: job.index,
            attempts: job.control.attempts(),
            status: job.status.clone(),
        }
    }
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse<'a> {
    pub length: usize,
    pub difficulty: u32,
    pub valid: bool,
    pub chain: &'a [Block],
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
    pub difficulty: u32,
}

#[derive(Serialize)]
pub struct PatientsResponse<'a> {
    pub total: usize,
    pub patients: Vec<&'a PatientRecord>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub chain: ChainStats,
    pub difficulty: u32,
    pub mining_job: Option<Uuid>,
}

/* ---------- Errors ---------- */

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<&'static str>,
}

impl From<&LedgerError> for ErrorResponse {
    fn from(err: &LedgerError) -> Self {
        let fields = match err {
            LedgerError::Validation { fields } => fields.clone(),
            LedgerError::InvalidField { field, .. } => vec![*field],
            _ => Vec::new(),
        };
        Self {
            error: err.to_string(),
            fields,
        }
    }
}

impl ErrorResponse {
    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            fields: Vec::new(),
        }
    }
}
