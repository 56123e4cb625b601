// Shared test helpers: in-process fake control plane backed by the task queue

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use vpn_agent::task_queue::{TaskQueue, TaskStatus};

pub const TOKEN: &str = "control-secret";

#[derive(Clone, Default)]
pub struct ControlPlane {
    pub queue: Arc<Mutex<TaskQueue>>,
    pub heartbeats: Arc<AtomicU64>,
    pub acks: Arc<Mutex<Vec<(i64, String)>>>,
    /// When set, /heartbeat answers 500 (simulated ingestion outage).
    pub fail_heartbeats: Arc<AtomicBool>,
}

impl ControlPlane {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(TaskQueue::new())),
            ..Default::default()
        }
    }
}

async fn heartbeat_handler(
    State(cp): State<ControlPlane>,
    _body: Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    if cp.fail_heartbeats.load(Ordering::Relaxed) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"detail": "persistence failure"})),
        );
    }
    let n = cp.heartbeats.fetch_add(1, Ordering::Relaxed) + 1;
    (
        StatusCode::OK,
        Json(serde_json::json!({"success": true, "heartbeat_id": n})),
    )
}

async fn tasks_handler(
    State(cp): State<ControlPlane>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let tasks = match params.get("server_id") {
        Some(server_id) => cp.queue.lock().unwrap().pull(server_id),
        None => Vec::new(),
    };
    Json(serde_json::to_value(tasks).unwrap())
}

async fn ack_handler(
    State(cp): State<ControlPlane>,
    Path(task_id): Path<i64>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let status = match body["status"].as_str() {
        Some("done") => TaskStatus::Done,
        Some("failed") => TaskStatus::Failed,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"detail": "invalid status"})),
            );
        }
    };
    let mut queue = cp.queue.lock().unwrap();
    match queue.ack(task_id, status) {
        Ok(()) => {
            cp.acks
                .lock()
                .unwrap()
                .push((task_id, body["status"].as_str().unwrap().to_string()));
            (StatusCode::OK, Json(serde_json::json!({"ok": true})))
        }
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"detail": e.to_string()})),
        ),
    }
}

/// Bind the fake control plane on an ephemeral port; returns its base URL.
pub async fn spawn_control_plane(cp: ControlPlane) -> String {
    let app = Router::new()
        .route("/heartbeat", post(heartbeat_handler))
        .route("/tasks", get(tasks_handler))
        .route("/tasks/{task_id}/ack", post(ack_handler))
        .with_state(cp);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}
