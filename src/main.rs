use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::info;

use patient_ledger::api::{self, AppState};
use patient_ledger::config::Config;
use patient_ledger::store::{FileStore, load_or_fresh};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = Config::from_env();
    let store = FileStore::new(&config.ledger_path);
    let blockchain = load_or_fresh(&store, config.difficulty);
    info!(
        "ledger at {} ({} block(s), difficulty {})",
        store.path().display(),
        blockchain.len(),
        blockchain.difficulty()
    );

    println!(
        "🏥 Starting patient ledger API at http://{}:{}",
        config.host, config.port
    );

    let state = web::Data::new(AppState::new(blockchain, Box::new(store)));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
