use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use serde_json::{Value, json};
use uuid::Uuid;

use super::init_routes;
use super::jobs::run_job;
use super::models::{AppState, JobStatus, KEEP_SETTLED_JOBS, MiningJob};
use crate::blockchain::{Block, Blockchain, Miner, MiningControl};
use crate::store::MemoryStore;

fn state(difficulty: u32) -> web::Data<AppState> {
    web::Data::new(AppState::new(
        Blockchain::new(difficulty),
        Box::new(MemoryStore::new()),
    ))
}

fn john_doe() -> Value {
    json!({
        "id": "P001",
        "name": "John Doe",
        "age": 25,
        "gender": "Male",
        "bloodType": "O+",
        "diagnosis": "Flu",
        "treatment": "Rest",
        "doctor": "Dr. Smith"
    })
}

/// Wait until the job leaves the mining state.
async fn settle(state: &web::Data<AppState>, id: Uuid) -> JobStatus {
    for _ in 0..500 {
        let status = {
            let jobs = state.jobs.lock().expect("mutex poisoned");
            jobs.get(&id).map(|j| j.status.clone())
        };
        match status {
            Some(JobStatus::Mining) | None => {
                actix_web::rt::time::sleep(Duration::from_millis(10)).await
            }
            Some(done) => return done,
        }
    }
    panic!("job {id} did not settle");
}

/// Register a mining job for `candidate` the way `POST /patients/` does,
/// leaving the caller to drive `run_job` itself.
fn queue_job(state: &web::Data<AppState>, candidate: &Block) -> (Uuid, Arc<MiningControl>) {
    let job = MiningJob {
        id: Uuid::new_v4(),
        patient_id: candidate.data.id.clone(),
        index: candidate.index,
        submitted: Instant::now(),
        control: Arc::new(MiningControl::new()),
        status: JobStatus::Mining,
    };
    let (id, control) = (job.id, job.control.clone());
    state.jobs.lock().unwrap().insert(id, job);
    (id, control)
}

fn candidate(state: &web::Data<AppState>) -> Block {
    state
        .blockchain
        .lock()
        .unwrap()
        .prepare_block(serde_json::from_value(john_doe()).unwrap())
        .unwrap()
}

fn job_id(body: &Value) -> Uuid {
    body["job_id"].as_str().unwrap().parse().unwrap()
}

#[actix_web::test]
async fn health_is_up() {
    let app = test::init_service(App::new().configure(init_routes)).await;
    let req = test::TestRequest::get().uri("/api/v1/health/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn submitted_patient_is_mined_and_persisted() {
    let state = state(1);
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(init_routes)).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/patients/")
        .set_json(john_doe())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["state"], "mining");
    assert_eq!(body["index"], 1);
    assert_eq!(body["patient_id"], "P001");

    let id = job_id(&body);
    assert!(matches!(settle(&state, id).await, JobStatus::Mined { .. }));

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/jobs/{id}/"))
        .to_request();
    let job: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(job["state"], "mined");
    assert!(job["hash"].as_str().unwrap().starts_with('0'));

    let req = test::TestRequest::get().uri("/api/v1/patients/").to_request();
    let patients: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(patients["total"], 1);
    assert_eq!(patients["patients"][0]["name"], "John Doe");
    assert_eq!(patients["patients"][0]["bloodType"], "O+");

    let req = test::TestRequest::get().uri("/api/v1/validate/").to_request();
    let valid: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(valid["valid"], true);
    assert_eq!(valid["length"], 2);

    let snapshot = state.store.load().unwrap().expect("snapshot saved");
    let restored = Blockchain::from_json(&snapshot, 1).unwrap();
    assert_eq!(restored.len(), 2);
    assert!(restored.is_chain_valid());
}

#[actix_web::test]
async fn incomplete_form_is_rejected() {
    let state = state(1);
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(init_routes)).await;

    let mut form = john_doe();
    form.as_object_mut().unwrap().remove("doctor");
    let req = test::TestRequest::post()
        .uri("/api/v1/patients/")
        .set_json(form)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["fields"], json!(["doctor"]));

    assert_eq!(state.blockchain.lock().unwrap().len(), 1);
    assert!(state.jobs.lock().unwrap().is_empty());
}

#[actix_web::test]
async fn one_job_at_a_time_and_cancel_leaves_ledger_untouched() {
    // unreachable difficulty: the job only ends when cancelled
    let state = state(64);
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(init_routes)).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/patients/")
        .set_json(john_doe())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let id = job_id(&body);

    let req = test::TestRequest::post()
        .uri("/api/v1/patients/")
        .set_json(john_doe())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::get().uri("/api/v1/stats/").to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["mining_job"], id.to_string());
    assert_eq!(stats["total_blocks"], 1);
    assert_eq!(stats["patient_records"], 0);
    assert_eq!(stats["valid"], true);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/jobs/{id}/"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    assert!(matches!(settle(&state, id).await, JobStatus::Cancelled));
    assert_eq!(state.blockchain.lock().unwrap().len(), 1);
    assert!(state.store.load().unwrap().is_none());

    // a settled job cannot be cancelled again
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/jobs/{id}/"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn unknown_job_is_not_found() {
    let app = test::init_service(App::new().app_data(state(1)).configure(init_routes)).await;
    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/jobs/{}/", Uuid::new_v4()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn export_import_and_reset() {
    let state = state(1);
    state
        .blockchain
        .lock()
        .unwrap()
        .add_block(serde_json::from_value(john_doe()).unwrap())
        .unwrap();
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(init_routes)).await;

    let req = test::TestRequest::get().uri("/api/v1/export/").to_request();
    let exported = test::call_and_read_body(&app, req).await;
    let exported = String::from_utf8(exported.to_vec()).unwrap();

    let req = test::TestRequest::post()
        .uri("/api/v1/import/")
        .set_payload("[not a ledger")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.blockchain.lock().unwrap().len(), 2);

    let req = test::TestRequest::post().uri("/api/v1/reset/").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["length"], 1);

    let req = test::TestRequest::post()
        .uri("/api/v1/import/")
        .set_payload(exported)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["length"], 2);
    assert_eq!(body["valid"], true);

    let req = test::TestRequest::get().uri("/api/v1/chain/").to_request();
    let chain: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(chain["chain"][1]["data"]["id"], "P001");
    assert_eq!(chain["chain"][1]["previousHash"], chain["chain"][0]["hash"]);
}

#[actix_web::test]
async fn cancel_while_the_ledger_is_busy_discards_the_sealed_block() {
    // difficulty 0: the first hash wins, so the search never sees the cancel
    let state = state(0);
    let block = candidate(&state);
    let (id, control) = queue_job(&state, &block);

    let (locked_tx, locked_rx) = mpsc::channel();
    let holder = {
        let state = state.clone();
        let control = control.clone();
        thread::spawn(move || {
            let _bc = state.blockchain.lock().unwrap();
            locked_tx.send(()).unwrap();
            // the block is sealed once attempts are published
            while control.attempts() == 0 {
                thread::sleep(Duration::from_millis(1));
            }
            control.cancel();
        })
    };
    locked_rx.recv().unwrap();

    run_job(state.clone(), id, block, Miner::new(0), control).await;
    holder.join().unwrap();

    let status = state.jobs.lock().unwrap()[&id].status.clone();
    assert!(matches!(status, JobStatus::Cancelled));
    assert_eq!(state.blockchain.lock().unwrap().len(), 1);
    assert!(state.store.load().unwrap().is_none());
}

#[actix_web::test]
async fn reset_while_mining_fails_the_job_and_keeps_the_new_ledger() {
    let state = state(1);
    state
        .blockchain
        .lock()
        .unwrap()
        .add_block(serde_json::from_value(john_doe()).unwrap())
        .unwrap();
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(init_routes)).await;

    let block = candidate(&state);
    assert_eq!(block.index, 2);
    let (id, control) = queue_job(&state, &block);

    let req = test::TestRequest::post().uri("/api/v1/reset/").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["length"], 1);

    run_job(state.clone(), id, block, Miner::new(1), control).await;

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/jobs/{id}/"))
        .to_request();
    let job: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(job["state"], "failed");
    assert!(
        job["reason"]
            .as_str()
            .unwrap()
            .contains("does not extend the current tail")
    );

    assert_eq!(state.blockchain.lock().unwrap().len(), 1);
    let snapshot = state.store.load().unwrap().expect("reset is persisted");
    assert_eq!(Blockchain::from_json(&snapshot, 1).unwrap().len(), 1);
}

#[actix_web::test]
async fn only_recent_settled_jobs_are_kept() {
    let state = state(1);
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(init_routes)).await;

    let mut ids = Vec::new();
    for _ in 0..KEEP_SETTLED_JOBS + 4 {
        let req = test::TestRequest::post()
            .uri("/api/v1/patients/")
            .set_json(john_doe())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let id = job_id(&body);
        assert!(matches!(settle(&state, id).await, JobStatus::Mined { .. }));
        ids.push(id);
    }

    assert_eq!(state.jobs.lock().unwrap().len(), KEEP_SETTLED_JOBS + 1);
    assert_eq!(state.blockchain.lock().unwrap().len(), KEEP_SETTLED_JOBS + 5);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/jobs/{}/", ids[0]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/jobs/{}/", ids.last().unwrap()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn age_is_accepted_as_text_and_checked() {
    let state = state(1);
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(init_routes)).await;

    let mut form = john_doe();
    form["age"] = json!("42");
    let req = test::TestRequest::post()
        .uri("/api/v1/patients/")
        .set_json(form)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(matches!(settle(&state, job_id(&body)).await, JobStatus::Mined { .. }));
    assert_eq!(state.blockchain.lock().unwrap().last_block().data.age, 42);

    for age in [json!(-3), json!("abc"), json!(151)] {
        let mut form = john_doe();
        form["age"] = age;
        let req = test::TestRequest::post()
            .uri("/api/v1/patients/")
            .set_json(form)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["fields"], json!(["age"]));
    }
    assert_eq!(state.blockchain.lock().unwrap().len(), 2);
}

#[actix_web::test]
async fn unreadable_body_gets_a_json_error() {
    let app = test::init_service(App::new().app_data(state(1)).configure(init_routes)).await;

    let mut form = john_doe();
    form["age"] = json!(25.5);
    let req = test::TestRequest::post()
        .uri("/api/v1/patients/")
        .set_json(form)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().starts_with("invalid request body"));

    let req = test::TestRequest::post()
        .uri("/api/v1/patients/")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());
}
