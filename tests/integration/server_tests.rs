//! HTTP-level tests for the playground API

use actix_web::{test, App};
use serde_json::json;

use pyground_server::{build_state, routes};

use crate::common::{setup_test_logging, test_config};

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state)
                .configure(routes::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn run_endpoint_returns_captured_output() {
    setup_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(test_config(dir.path())).unwrap();
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/run")
        .set_json(json!({ "code": "print(\"hi\")" }))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["stdout"], "hi\n");
    assert_eq!(body["stderr"], "");
    assert!(body["figures"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn run_endpoint_reports_script_faults_with_http_200() {
    setup_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(test_config(dir.path())).unwrap();
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/run")
        .set_json(json!({ "code": "raise ValueError(\"bad\")" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["stderr"].as_str().unwrap().contains("ValueError: bad"));
}

#[actix_web::test]
async fn save_list_load_roundtrip() {
    setup_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(test_config(dir.path())).unwrap();
    let app = test_app!(state);

    let save = test::TestRequest::post()
        .uri("/api/save")
        .set_json(json!({ "filename": "demo", "code": "print(1)" }))
        .to_request();
    let saved: serde_json::Value = test::call_and_read_body_json(&app, save).await;
    assert_eq!(saved["success"], true);

    let list = test::TestRequest::get().uri("/api/scripts").to_request();
    let listed: serde_json::Value = test::call_and_read_body_json(&app, list).await;
    assert_eq!(listed["files"], json!(["demo.py"]));

    let load = test::TestRequest::get()
        .uri("/api/scripts/demo.py")
        .to_request();
    let loaded: serde_json::Value = test::call_and_read_body_json(&app, load).await;
    assert_eq!(loaded["success"], true);
    assert_eq!(loaded["code"], "print(1)");
}

#[actix_web::test]
async fn missing_script_is_a_404() {
    setup_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(test_config(dir.path())).unwrap();
    let app = test_app!(state);

    let req = test::TestRequest::get()
        .uri("/api/scripts/ghost.py")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn empty_filename_is_rejected() {
    setup_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(test_config(dir.path())).unwrap();
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/save")
        .set_json(json!({ "filename": "", "code": "x = 1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn health_endpoint_responds() {
    setup_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let state = build_state(test_config(dir.path())).unwrap();
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");
}
