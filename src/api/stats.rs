use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, StatsResponse};

/// Dashboard counters: blocks, patient records, validity, mining state.
#[get("/stats/")]
pub async fn get_stats(state: web::Data<AppState>) -> impl Responder {
    // Snapshot the ledger first, then the jobs (never both locks at once)
    let (chain, difficulty) = {
        let bc = state.blockchain.lock().expect("mutex poisoned");
        (bc.stats(), bc.difficulty())
    };
    let mining_job = state.active_job();

    HttpResponse::Ok().json(StatsResponse {
        chain,
        difficulty,
        mining_job,
    })
}
