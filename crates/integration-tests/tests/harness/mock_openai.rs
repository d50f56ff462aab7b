//! Mock `OpenAI` images backend for integration tests
//!
//! Answers `POST /v1/images/generations` with one image per requested `n`,
//! or with a canned error.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Mock DALL-E backend with request counters
pub struct MockOpenAi {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockOpenAiState>,
}

struct MockOpenAiState {
    request_count: AtomicU32,
    /// Status and `error.message` to answer with instead of images
    failure: Option<(StatusCode, String)>,
    last_request: Mutex<Option<Value>>,
    last_authorization: Mutex<Option<String>>,
}

impl MockOpenAi {
    /// Start a mock that generates images
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_inner(None).await
    }

    /// Start a mock that rejects every request with `status` and `message`
    pub async fn start_failing(status: u16, message: &str) -> anyhow::Result<Self> {
        Self::start_inner(Some((StatusCode::from_u16(status)?, message.to_owned()))).await
    }

    async fn start_inner(failure: Option<(StatusCode, String)>) -> anyhow::Result<Self> {
        let state = Arc::new(MockOpenAiState {
            request_count: AtomicU32::new(0),
            failure,
            last_request: Mutex::new(None),
            last_authorization: Mutex::new(None),
        });

        let app = Router::new()
            .route("/v1/images/generations", routing::post(handle_generation))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
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
    ///
    /// Includes `/v1` since the provider appends `/images/generations`
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Number of generation requests received
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::Relaxed)
    }

    /// Body of the most recent generation request
    pub fn last_request(&self) -> Option<Value> {
        self.state.last_request.lock().unwrap().clone()
    }

    /// `Authorization` header of the most recent generation request
    pub fn last_authorization(&self) -> Option<String> {
        self.state.last_authorization.lock().unwrap().clone()
    }
}

impl Drop for MockOpenAi {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_generation(
    State(state): State<Arc<MockOpenAiState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    *state.last_authorization.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    *state.last_request.lock().unwrap() = Some(body.clone());

    if let Some((status, ref message)) = state.failure {
        let error = json!({
            "error": {
                "message": message,
                "type": "requests",
                "code": "rate_limit_exceeded",
            }
        });
        return (status, Json(error)).into_response();
    }

    let prompt = body["prompt"].as_str().unwrap_or_default();
    let n = body["n"].as_u64().unwrap_or(1);

    let data: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "url": format!("https://images.mock-openai.test/img-{i}.png"),
                "revised_prompt": format!("{prompt}, variation {i}"),
            })
        })
        .collect();

    Json(json!({ "created": 1_700_000_000, "data": data })).into_response()
}
