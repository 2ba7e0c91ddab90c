mod chain;
mod health;
mod jobs;
pub mod models;
mod patients;
mod stats;

#[cfg(test)]
mod tests;

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::web::{self, ServiceConfig};
use actix_web::{HttpRequest, HttpResponse};
use log::warn;

pub use models::AppState;

use models::ErrorResponse;

/// Malformed JSON bodies get the same error shape as validation failures.
fn json_error(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    warn!("{} {} - unreadable body: {err}", req.method(), req.path());
    let resp = HttpResponse::BadRequest().json(ErrorResponse::message(format!(
        "invalid request body: {err}"
    )));
    InternalError::from_response(err, resp).into()
}

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .app_data(web::JsonConfig::default().error_handler(json_error))
            .service(health::health_check)
            .service(chain::get_chain)
            .service(chain::validate_chain)
            .service(chain::export_chain)
            .service(chain::import_chain)
            .service(chain::reset_chain)
            .service(patients::get_patients)
            .service(patients::post_patient)
            .service(jobs::get_job)
            .service(jobs::cancel_job)
            .service(stats::get_stats),
    );
}
