use std::sync::Arc;
use std::time::Instant;

use actix_web::{HttpResponse, Responder, get, post, web};
use log::{debug, info, warn};
use uuid::Uuid;

use super::jobs::run_job;
use super::models::{
    AppState, ErrorResponse, JobResponse, JobStatus, KEEP_SETTLED_JOBS, MiningJob,
    PatientsResponse, forget_settled_jobs,
};
use crate::blockchain::{Miner, MiningControl};
use crate::patient::PatientForm;

/// All patient records, in the order they were added.
#[get("/patients/")]
pub async fn get_patients(state: web::Data<AppState>) -> impl Responder {
    let bc = state.blockchain.lock().expect("mutex poisoned");
    let patients: Vec<_> = bc.patients().collect();
    HttpResponse::Ok().json(PatientsResponse {
        total: patients.len(),
        patients,
    })
}

/// Submit a patient record. Validation happens now; mining runs in the
/// background and is tracked as a job:
/// - 400 if the form is incomplete or invalid
/// - 409 while another record is still being mined
/// - 202 with the job otherwise
#[post("/patients/")]
pub async fn post_patient(
    state: web::Data<AppState>,
    form: web::Json<PatientForm>,
) -> impl Responder {
    // Build the candidate under a short ledger lock; PoW runs without it
    let (candidate, miner) = {
        let bc = state.blockchain.lock().expect("mutex poisoned");
        match bc.prepare_block(form.into_inner()) {
            Ok(block) => (block, Miner::new(bc.difficulty())),
            Err(e) if e.is_validation() => {
                warn!("POST /patients/ - rejected: {e}");
                return HttpResponse::BadRequest().json(ErrorResponse::from(&e));
            }
            Err(e) => {
                warn!("POST /patients/ - failed: {e}");
                return HttpResponse::InternalServerError().json(ErrorResponse::from(&e));
            }
        }
    };

    let job = MiningJob {
        id: Uuid::new_v4(),
        patient_id: candidate.data.id.clone(),
        index: candidate.index,
        submitted: Instant::now(),
        control: Arc::new(MiningControl::new()),
        status: JobStatus::Mining,
    };
    let resp = JobResponse::from(&job);
    let (job_id, control) = (job.id, job.control.clone());
    {
        // check-and-insert under one lock: a single job mines at a time
        let mut jobs = state.jobs.lock().expect("mutex poisoned");
        if let Some(active) = jobs.values().find(|j| matches!(j.status, JobStatus::Mining)) {
            warn!("POST /patients/ - rejected: job {} still mining", active.id);
            return HttpResponse::Conflict().json(ErrorResponse::message(format!(
                "another record is being mined (job {})",
                active.id
            )));
        }
        forget_settled_jobs(&mut jobs, KEEP_SETTLED_JOBS);
        jobs.insert(job_id, job);
        debug!("JOBS - queued {} (tracked: {})", job_id, jobs.len());
    }

    info!(
        "POST /patients/ - mining block #{} for patient {} as job {}",
        resp.index, resp.patient_id, job_id
    );
    actix_web::rt::spawn(run_job(state, job_id, candidate, miner, control));

    HttpResponse::Accepted().json(resp)
}
