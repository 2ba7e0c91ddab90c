use std::sync::Arc;

use actix_web::{HttpResponse, Responder, delete, get, web};
use log::{debug, info, warn};
use uuid::Uuid;

use super::models::{AppState, ErrorResponse, JobResponse, JobStatus};
use crate::blockchain::{Block, LedgerError, Miner, MiningControl};
use crate::store::persist;

/// Poll a mining job: progress while mining, the sealed block once done.
#[get("/jobs/{id}/")]
pub async fn get_job(state: web::Data<AppState>, path: web::Path<Uuid>) -> impl Responder {
    let id = path.into_inner();
    let jobs = state.jobs.lock().expect("mutex poisoned");
    match jobs.get(&id) {
        Some(job) => HttpResponse::Ok().json(JobResponse::from(job)),
        None => HttpResponse::NotFound().json(ErrorResponse::message(format!("unknown job {id}"))),
    }
}

/// Cancel a job that is still mining. Nothing is appended for it.
#[delete("/jobs/{id}/")]
pub async fn cancel_job(state: web::Data<AppState>, path: web::Path<Uuid>) -> impl Responder {
    let id = path.into_inner();
    let jobs = state.jobs.lock().expect("mutex poisoned");
    let Some(job) = jobs.get(&id) else {
        return HttpResponse::NotFound().json(ErrorResponse::message(format!("unknown job {id}")));
    };
    if !matches!(job.status, JobStatus::Mining) {
        return HttpResponse::Conflict().json(ErrorResponse::message(format!(
            "job {id} is no longer mining"
        )));
    }

    job.control.cancel();
    info!("DELETE /jobs/{id}/ - cancellation requested");
    HttpResponse::Accepted().json(JobResponse::from(job))
}

/// Mine `candidate` on the blocking pool, then append it if it still
/// extends the tail, persist, and record the outcome on the job.
///
/// Lock order is jobs, then blockchain; no other path nests the two. Holding
/// the jobs lock across the append means a cancel either lands before the
/// check below or finds the job already settled (409).
pub(crate) async fn run_job(
    state: web::Data<AppState>,
    job_id: Uuid,
    candidate: Block,
    miner: Miner,
    control: Arc<MiningControl>,
) {
    let worker_control = control.clone();
    let mined = web::block(move || {
        let mut block = candidate;
        miner
            .mine_with(&mut block, &worker_control)
            .map(|()| block)
    })
    .await;

    let mut jobs = state.jobs.lock().expect("mutex poisoned");
    let status = match mined {
        Ok(Ok(block)) => {
            let mut bc = state.blockchain.lock().expect("mutex poisoned");
            if control.is_cancelled() {
                info!("JOBS - {job_id} cancelled after its block was sealed, discarding it");
                JobStatus::Cancelled
            } else {
                let status = match bc.append_mined_block(block) {
                    Ok(sealed) => JobStatus::Mined {
                        hash: sealed.hash.clone(),
                        nonce: sealed.nonce,
                    },
                    Err(e) => {
                        warn!("JOBS - {job_id} mined a block that was not appended: {e}");
                        JobStatus::Failed {
                            reason: e.to_string(),
                        }
                    }
                };
                if matches!(status, JobStatus::Mined { .. }) {
                    persist(state.store.as_ref(), &bc);
                }
                status
            }
        }
        Ok(Err(LedgerError::MiningCancelled)) => JobStatus::Cancelled,
        Ok(Err(e)) => JobStatus::Failed {
            reason: e.to_string(),
        },
        Err(e) => {
            warn!("JOBS - {job_id} worker failed: {e}");
            JobStatus::Failed {
                reason: e.to_string(),
            }
        }
    };

    debug!(
        "JOBS - {} finished after {} attempts: {:?}",
        job_id,
        control.attempts(),
        status
    );
    if let Some(job) = jobs.get_mut(&job_id) {
        job.status = status;
    }
}
