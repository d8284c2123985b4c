//! 本地 mock vendor：同时提供 OpenAI 与 Mistral 的批处理路由

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

pub const API_KEY: &str = "test-key";

/// mock 中已完成作业的输出
pub const OUTPUT_CONTENT: &str = "{\"custom_id\":\"req-1\",\"response\":{\"status_code\":200}}\n";

#[derive(Debug, Clone)]
pub struct Upload {
    pub purpose: String,
    pub filename: String,
    pub content: Vec<u8>,
}

/// 服务端收到的请求
#[derive(Debug, Default)]
pub struct Recorded {
    pub uploads: Vec<Upload>,
    pub job_requests: Vec<Value>,
    pub list_queries: Vec<HashMap<String, String>>,
}

type Shared = Arc<Mutex<Recorded>>;

pub struct MockVendor {
    pub url: String,
    pub recorded: Shared,
    shutdown: oneshot::Sender<()>,
}

impl MockVendor {
    pub async fn spawn() -> Self {
        let recorded: Shared = Arc::default();
        let app = Router::new()
            .route("/v1/files", post(upload_file))
            .route("/v1/files/:id/content", get(download_file))
            .route("/v1/batches", post(openai_create).get(openai_list))
            .route("/v1/batches/:id", get(openai_retrieve))
            .route("/v1/batches/:id/cancel", post(openai_cancel))
            .route("/v1/batch/jobs", post(mistral_create).get(mistral_list))
            .route("/v1/batch/jobs/:id", get(mistral_retrieve))
            .route("/v1/batch/jobs/:id/cancel", post(mistral_cancel))
            .with_state(recorded.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            recorded,
            shutdown,
        }
    }

    pub fn stop(self) {
        let _ = self.shutdown.send(());
    }
}

fn check_auth(headers: &HeaderMap) -> Result<(), Response> {
    let expected = format!("Bearer {}", API_KEY);
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "Incorrect API key provided"}})),
        )
            .into_response()),
    }
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"error": {"message": message}}))).into_response()
}

async fn upload_file(
    State(recorded): State<Shared>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if let Err(response) = check_auth(&headers) {
        return response;
    }

    let mut upload = Upload {
        purpose: String::new(),
        filename: String::new(),
        content: Vec::new(),
    };
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("purpose") => upload.purpose = field.text().await.unwrap(),
            Some("file") => {
                upload.filename = field.file_name().unwrap_or_default().to_string();
                upload.content = field.bytes().await.unwrap().to_vec();
            }
            _ => {}
        }
    }

    let body = json!({
        "id": "file-abc123",
        "object": "file",
        "bytes": upload.content.len(),
        "created_at": 1714508499,
        "filename": upload.filename,
        "purpose": upload.purpose,
    });
    recorded.lock().unwrap().uploads.push(upload);
    Json(body).into_response()
}

async fn download_file(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(response) = check_auth(&headers) {
        return response;
    }
    if id == "file-out" {
        OUTPUT_CONTENT.into_response()
    } else {
        not_found(&format!("No such File object: {}", id))
    }
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

fn openai_batch(id: &str, status: &str) -> Value {
    let mut batch = json!({
        "id": id,
        "object": "batch",
        "endpoint": "/v1/chat/completions",
        "status": status,
        "input_file_id": "file-abc123",
        "completion_window": "24h",
        "created_at": 1714508499,
        "request_counts": {"total": 2, "completed": 0, "failed": 0},
    });
    if status == "completed" {
        batch["output_file_id"] = json!("file-out");
        batch["request_counts"] = json!({"total": 2, "completed": 2, "failed": 0});
    }
    batch
}

async fn openai_create(
    State(recorded): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = check_auth(&headers) {
        return response;
    }
    recorded.lock().unwrap().job_requests.push(body);
    Json(openai_batch("batch_new", "validating")).into_response()
}

async fn openai_retrieve(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(response) = check_auth(&headers) {
        return response;
    }
    match id.as_str() {
        "batch_done" => Json(openai_batch(&id, "completed")).into_response(),
        "batch_missing" => not_found("No batch found with id 'batch_missing'"),
        _ => Json(openai_batch(&id, "in_progress")).into_response(),
    }
}

async fn openai_cancel(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(response) = check_auth(&headers) {
        return response;
    }
    Json(openai_batch(&id, "cancelling")).into_response()
}

async fn openai_list(
    State(recorded): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(response) = check_auth(&headers) {
        return response;
    }
    let after = query.get("after").cloned();
    recorded.lock().unwrap().list_queries.push(query);

    let body = match after.as_deref() {
        None => json!({
            "object": "list",
            "data": [openai_batch("batch_3", "in_progress"), openai_batch("batch_2", "completed")],
            "first_id": "batch_3",
            "last_id": "batch_2",
            "has_more": true,
        }),
        Some(_) => json!({
            "object": "list",
            "data": [openai_batch("batch_1", "failed")],
            "first_id": "batch_1",
            "last_id": "batch_1",
            "has_more": false,
        }),
    };
    Json(body).into_response()
}

// ---------------------------------------------------------------------------
// Mistral
// ---------------------------------------------------------------------------

fn mistral_job(id: &str, status: &str) -> Value {
    let mut job = json!({
        "id": id,
        "object": "batch",
        "input_files": ["file-abc123"],
        "endpoint": "/v1/chat/completions",
        "model": "mistral-small-latest",
        "errors": [],
        "status": status,
        "created_at": 1721231023,
        "total_requests": 2,
        "completed_requests": 0,
        "succeeded_requests": 0,
        "failed_requests": 0,
    });
    if status == "SUCCESS" {
        job["output_file"] = json!("file-out");
        job["completed_requests"] = json!(2);
        job["succeeded_requests"] = json!(2);
    }
    job
}

async fn mistral_create(
    State(recorded): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = check_auth(&headers) {
        return response;
    }
    recorded.lock().unwrap().job_requests.push(body);
    Json(mistral_job("job-new", "QUEUED")).into_response()
}

async fn mistral_retrieve(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(response) = check_auth(&headers) {
        return response;
    }
    match id.as_str() {
        "job-done" => Json(mistral_job(&id, "SUCCESS")).into_response(),
        "job-missing" => not_found("Batch job not found"),
        _ => Json(mistral_job(&id, "RUNNING")).into_response(),
    }
}

async fn mistral_cancel(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(response) = check_auth(&headers) {
        return response;
    }
    Json(mistral_job(&id, "CANCELLATION_REQUESTED")).into_response()
}

async fn mistral_list(
    State(recorded): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(response) = check_auth(&headers) {
        return response;
    }
    let page = query.get("page").cloned().unwrap_or_else(|| "0".to_string());
    recorded.lock().unwrap().list_queries.push(query);

    let data = if page == "0" {
        json!([mistral_job("job-3", "RUNNING"), mistral_job("job-2", "SUCCESS")])
    } else {
        json!([mistral_job("job-1", "FAILED")])
    };
    Json(json!({"object": "list", "data": data, "total": 3})).into_response()
}
