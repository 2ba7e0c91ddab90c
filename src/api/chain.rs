use actix_web::{HttpResponse, Responder, get, post, web};
use log::{info, warn};

use super::models::{AppState, ChainResponse, ErrorResponse, ValidateResponse};
use crate::blockchain::Blockchain;
use crate::store::persist;

/// Get the full blockchain.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    let bc = state.blockchain.lock().expect("mutex poisoned");
    HttpResponse::Ok().json(ChainResponse {
        length: bc.len(),
        difficulty: bc.difficulty(),
        valid: bc.is_chain_valid(),
        chain: bc.chain(),
    })
}

/// Validate the whole chain.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> impl Responder {
    let bc = state.blockchain.lock().expect("mutex poisoned");
    let resp = ValidateResponse {
        valid: bc.is_chain_valid(),
        length: bc.len(),
        difficulty: bc.difficulty(),
    };
    if !resp.valid {
        warn!("chain failed validation (length={})", resp.length);
    }
    HttpResponse::Ok().json(resp)
}

/// Raw ledger snapshot, the same JSON the store keeps.
#[get("/export/")]
pub async fn export_chain(state: web::Data<AppState>) -> impl Responder {
    let bc = state.blockchain.lock().expect("mutex poisoned");
    match bc.to_json() {
        Ok(json) => HttpResponse::Ok()
            .content_type("application/json")
            .body(json),
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse::from(&e)),
    }
}

/// Replace the ledger with an exported snapshot.
#[post("/import/")]
pub async fn import_chain(state: web::Data<AppState>, body: String) -> impl Responder {
    let mut bc = state.blockchain.lock().expect("mutex poisoned");
    let imported = match Blockchain::from_json(&body, bc.difficulty()) {
        Ok(imported) => imported,
        Err(e) => {
            warn!("POST /import/ - rejected: {e}");
            return HttpResponse::BadRequest().json(ErrorResponse::from(&e));
        }
    };

    *bc = imported;
    persist(state.store.as_ref(), &bc);
    info!(
        "POST /import/ - ledger replaced ({} block(s), valid={})",
        bc.len(),
        bc.is_chain_valid()
    );
    HttpResponse::Ok().json(ValidateResponse {
        valid: bc.is_chain_valid(),
        length: bc.len(),
        difficulty: bc.difficulty(),
    })
}

/// Discard all history. A job still mining will find its block stale.
#[post("/reset/")]
pub async fn reset_chain(state: web::Data<AppState>) -> impl Responder {
    let mut bc = state.blockchain.lock().expect("mutex poisoned");
    bc.reset();
    persist(state.store.as_ref(), &bc);
    HttpResponse::Ok().json(ValidateResponse {
        valid: bc.is_chain_valid(),
        length: bc.len(),
        difficulty: bc.difficulty(),
    })
}
