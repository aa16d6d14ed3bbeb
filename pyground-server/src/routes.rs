//! HTTP routes for the playground API

use actix_web::{get, post, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use pyground_sandbox::{ExecutionRequest, ExecutionResult, Executor};

use crate::config::Config;
use crate::store::{ScriptStore, StoreError};

pub struct AppState {
    pub executor: Arc<Executor>,
    pub store: ScriptStore,
    pub config: Config,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(run_script)
        .service(save_script)
        .service(list_scripts)
        .service(load_script)
        .service(health);
}

#[derive(Debug, Deserialize)]
pub struct RunPayload {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct SavePayload {
    pub filename: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
struct SaveResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoadResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[post("/api/run")]
async fn run_script(
    state: web::Data<AppState>,
    payload: web::Json<RunPayload>,
) -> impl Responder {
    let request = ExecutionRequest::new(payload.into_inner().code)
        .with_time_budget(state.config.max_execution_time)
        .with_memory_budget(state.config.max_memory_bytes);

    // The executor is synchronous and serializes executions; run it off the
    // async workers.
    let executor = Arc::clone(&state.executor);
    match web::block(move || executor.run(&request)).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(err) => {
            tracing::error!(error = %err, "execution task failed");
            HttpResponse::InternalServerError().json(ExecutionResult {
                stdout: String::new(),
                stderr: format!("Server error: {err}"),
                figures: Vec::new(),
            })
        }
    }
}

#[post("/api/save")]
async fn save_script(
    state: web::Data<AppState>,
    payload: web::Json<SavePayload>,
) -> impl Responder {
    let SavePayload { filename, code } = payload.into_inner();
    if filename.is_empty() {
        return HttpResponse::BadRequest().json(SaveResponse {
            success: false,
            path: None,
            error: Some("Filename is required".to_string()),
        });
    }
    match state.store.save(&filename, &code) {
        Ok(path) => HttpResponse::Ok().json(SaveResponse {
            success: true,
            path: Some(path.display().to_string()),
            error: None,
        }),
        Err(err) => store_error_response(err),
    }
}

#[get("/api/scripts")]
async fn list_scripts(state: web::Data<AppState>) -> impl Responder {
    match state.store.list() {
        Ok(files) => HttpResponse::Ok().json(serde_json::json!({ "files": files })),
        Err(err) => store_error_response(err),
    }
}

#[get("/api/scripts/{name}")]
async fn load_script(state: web::Data<AppState>, name: web::Path<String>) -> impl Responder {
    match state.store.load(&name) {
        Ok(code) => HttpResponse::Ok().json(LoadResponse {
            success: true,
            code: Some(code),
            error: None,
        }),
        Err(err) => store_error_response(err),
    }
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

fn store_error_response(err: StoreError) -> HttpResponse {
    let body = SaveResponse {
        success: false,
        path: None,
        error: Some(err.to_string()),
    };
    match err {
        StoreError::InvalidName => HttpResponse::BadRequest().json(body),
        StoreError::NotFound(_) => HttpResponse::NotFound().json(body),
        StoreError::Io(_) => HttpResponse::InternalServerError().json(body),
    }
}
