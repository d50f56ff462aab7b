//! Mock Black Forest Labs backend for integration tests
//!
//! `POST /v1/{model}` accepts a task and returns an absolute polling URL.
//! `GET /v1/get_result?id=..` walks through a scripted list of statuses for
//! that task; the last status repeats once the script is exhausted.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Mock BFL backend with request counters
pub struct MockBfl {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockBflState>,
}

struct MockBflState {
    addr: SocketAddr,
    submit_count: AtomicU32,
    poll_count: AtomicU32,
    /// Status answered to every submission instead of accepting it
    submit_failure: Option<StatusCode>,
    /// Statuses each task walks through
    script: Vec<&'static str>,
    /// Position of every known task in `script`
    tasks: Mutex<HashMap<String, usize>>,
    submissions: Mutex<Vec<(String, Value)>>,
}

#[derive(Deserialize)]
struct PollQuery {
    id: String,
}

impl MockBfl {
    /// Start a mock whose tasks report each of `script` in turn
    pub async fn start(script: &[&'static str]) -> anyhow::Result<Self> {
        Self::start_inner(script.to_vec(), None).await
    }

    /// Start a mock that rejects every submission with `status`
    pub async fn start_rejecting(status: u16) -> anyhow::Result<Self> {
        Self::start_inner(vec!["Ready"], Some(StatusCode::from_u16(status)?)).await
    }

    async fn start_inner(script: Vec<&'static str>, submit_failure: Option<StatusCode>) -> anyhow::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(MockBflState {
            addr,
            submit_count: AtomicU32::new(0),
            poll_count: AtomicU32::new(0),
            submit_failure,
            script,
            tasks: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/get_result", routing::get(handle_poll))
            .route("/v1/{model}", routing::post(handle_submit))
            .with_state(Arc::clone(&state));

        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring the mock as a provider
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Number of task submissions received
    pub fn submit_count(&self) -> u32 {
        self.state.submit_count.load(Ordering::Relaxed)
    }

    /// Number of polls received
    pub fn poll_count(&self) -> u32 {
        self.state.poll_count.load(Ordering::Relaxed)
    }

    /// Model path segment and body of every submission, in arrival order
    pub fn submissions(&self) -> Vec<(String, Value)> {
        self.state.submissions.lock().unwrap().clone()
    }
}

impl Drop for MockBfl {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn has_key(headers: &HeaderMap) -> bool {
    headers.get("x-key").is_some_and(|v| v == "test-key")
}

async fn handle_submit(
    State(state): State<Arc<MockBflState>>,
    Path(model): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !has_key(&headers) {
        return (StatusCode::FORBIDDEN, Json(json!({ "detail": "Not authenticated" }))).into_response();
    }

    let task = state.submit_count.fetch_add(1, Ordering::Relaxed);
    state.submissions.lock().unwrap().push((model, body));

    if let Some(status) = state.submit_failure {
        return (status, Json(json!({ "detail": "Insufficient credits" }))).into_response();
    }

    let id = format!("task-{task}");
    state.tasks.lock().unwrap().insert(id.clone(), 0);

    Json(json!({
        "id": id,
        "polling_url": format!("http://{}/v1/get_result?id={id}", state.addr),
    }))
    .into_response()
}

async fn handle_poll(
    State(state): State<Arc<MockBflState>>,
    Query(query): Query<PollQuery>,
    headers: HeaderMap,
) -> Response {
    if !has_key(&headers) {
        return (StatusCode::FORBIDDEN, Json(json!({ "detail": "Not authenticated" }))).into_response();
    }

    state.poll_count.fetch_add(1, Ordering::Relaxed);

    let status = {
        let mut tasks = state.tasks.lock().unwrap();
        let Some(position) = tasks.get_mut(&query.id) else {
            return Json(json!({ "id": query.id, "status": "Task not found" })).into_response();
        };
        let last = state.script.len().saturating_sub(1);
        let status = state.script.get((*position).min(last)).copied().unwrap_or("Pending");
        *position += 1;
        status
    };

    let body = match status {
        "Ready" => json!({
            "id": query.id,
            "status": status,
            "result": { "sample": format!("https://delivery.mock-bfl.test/{}.png", query.id) },
        }),
        "Failed" | "Error" => json!({
            "id": query.id,
            "status": status,
            "details": "Content Moderated",
        }),
        _ => json!({ "id": query.id, "status": status }),
    };

    Json(body).into_response()
}
