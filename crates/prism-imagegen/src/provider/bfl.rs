use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use prism_config::ProviderId;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tokio::time::{Instant, sleep, timeout_at};
use url::Url;

use super::{ImageProvider, error_detail, normalize_base_url};
use crate::{
    error::{ProviderError, Result},
    fanout::fan_out,
    http_client::http_client,
    job::{GenerationJob, PollingHandle},
    types::{GenerationRequest, ImageResult, ProviderParams},
};

/// Default Black Forest Labs API base URL
const DEFAULT_BASE_URL: &str = "https://api.bfl.ai/v1";

/// Header carrying the BFL API key
const API_KEY_HEADER: &str = "x-key";

/// Upstream statuses that end a job unsuccessfully
const FAILED_STATUSES: [&str; 3] = ["Error", "Failed", "Task not found"];

const READY_STATUS: &str = "Ready";

/// Answer to a task submission
#[derive(Debug, Deserialize)]
pub(crate) struct SubmitResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub polling_url: Option<String>,
}

/// Answer to one poll of a submitted task
#[derive(Debug, Deserialize)]
pub(crate) struct PollResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollStatus {
    Ready,
    Failed,
    Pending,
}

impl PollStatus {
    fn classify(status: Option<&str>) -> Self {
        match status {
            Some(READY_STATUS) => Self::Ready,
            Some(status) if FAILED_STATUSES.contains(&status) => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Transport for the submit-and-poll task API
#[async_trait]
pub(crate) trait TaskApi: Send + Sync {
    /// Submit one generation task for `job`
    async fn submit(&self, job: &GenerationJob, model: &str, body: &ProviderParams) -> Result<SubmitResponse>;

    /// Fetch the current state of the task behind `job`'s polling handle
    async fn poll(&self, job: &GenerationJob) -> Result<PollResponse>;
}

/// HTTP transport against the BFL REST API
pub(crate) struct BflHttpApi {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

impl BflHttpApi {
    pub fn new(api_key: SecretString, base_url: Option<&Url>, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            base_url: normalize_base_url(base_url, DEFAULT_BASE_URL),
        })
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "BFL API error");

            return Err(ProviderError::upstream(
                status.as_u16(),
                format!("Error from BFL API: {}", body.trim()),
                error_detail(&body),
            ));
        }

        response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse BFL response");
            ProviderError::internal(format!("Unexpected response from BFL API: {e}"))
        })
    }
}

#[async_trait]
impl TaskApi for BflHttpApi {
    async fn submit(&self, job: &GenerationJob, model: &str, body: &ProviderParams) -> Result<SubmitResponse> {
        let url = format!("{}/{model}", self.base_url);

        tracing::debug!(job = job.index(), model, "submitting BFL task");

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(job = job.index(), error = %e, "BFL submission failed");
                ProviderError::from(e)
            })?;

        Self::read(response).await
    }

    async fn poll(&self, job: &GenerationJob) -> Result<PollResponse> {
        let handle = job
            .polling_handle()
            .ok_or_else(|| ProviderError::internal(format!("Job {} has no polling handle.", job.index())))?;

        let response = self
            .client
            .get(handle.as_str())
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(job = job.index(), error = %e, "BFL poll failed");
                ProviderError::from(e)
            })?;

        Self::read(response).await
    }
}

/// Black Forest Labs FLUX provider, one submitted task per image
pub(crate) struct BflFluxProvider<A = BflHttpApi> {
    api: A,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl BflFluxProvider {
    pub fn new(
        api_key: SecretString,
        base_url: Option<&Url>,
        timeout: Duration,
        poll_interval: Duration,
        poll_timeout: Duration,
    ) -> reqwest::Result<Self> {
        Ok(Self::with_api(
            BflHttpApi::new(api_key, base_url, timeout)?,
            poll_interval,
            poll_timeout,
        ))
    }
}

impl<A: TaskApi> BflFluxProvider<A> {
    pub const fn with_api(api: A, poll_interval: Duration, poll_timeout: Duration) -> Self {
        Self {
            api,
            poll_interval,
            poll_timeout,
        }
    }

    /// Drive one job to a terminal state and hand back its outcome
    async fn run_job(&self, index: usize, model: &str, body: &ProviderParams) -> Result<ImageResult> {
        let mut job = GenerationJob::new(index);

        if let Err(error) = self.drive(&mut job, model, body).await {
            job.fail(error)?;
        }

        tracing::debug!(job = index, state = %job.state(), elapsed = ?job.elapsed(), "BFL job finished");

        job.into_outcome()
    }

    async fn drive(&self, job: &mut GenerationJob, model: &str, body: &ProviderParams) -> Result<()> {
        let submission = self.api.submit(job, model, body).await?;

        let handle = submission
            .polling_url
            .map(PollingHandle::new)
            .ok_or_else(|| ProviderError::internal("BFL API did not return a polling_url."))?;

        let submitted_at = Instant::now();
        let deadline = submitted_at + self.poll_timeout;
        job.start_polling(handle, submission.id, submitted_at)?;
        tracing::debug!(job = job.index(), task_id = job.task_id(), "BFL task accepted");

        loop {
            sleep(self.poll_interval).await;

            if Instant::now() >= deadline {
                tracing::warn!(job = job.index(), last_poll = ?job.last_polled_at().map(|at| at.elapsed()), "BFL job out of time");
                return job.time_out(self.poll_timeout);
            }

            let Ok(response) = timeout_at(deadline, self.api.poll(job)).await else {
                tracing::warn!(job = job.index(), "BFL poll still in flight at deadline");
                return job.time_out(self.poll_timeout);
            };
            let response = response?;
            job.record_poll(Instant::now());

            match PollStatus::classify(response.status.as_deref()) {
                PollStatus::Ready => {
                    let image = ready_image(model, job, response)?;
                    tracing::debug!(job = job.index(), "BFL job ready");
                    return job.complete(image);
                }
                PollStatus::Failed => {
                    let status = response.status.as_deref().unwrap_or_default();
                    let details = response.details.as_ref().map_or_else(|| "N/A".to_string(), describe);
                    let message = format!(
                        "BFL image generation failed with status: {status}. Details: {details}"
                    );
                    let detail = json!({ "status": status, "details": response.details });

                    return job.fail(ProviderError::upstream_failure(message, Some(detail)));
                }
                PollStatus::Pending => {
                    tracing::trace!(job = job.index(), status = ?response.status, "BFL job pending");
                }
            }
        }
    }
}

#[async_trait]
impl<A: TaskApi> ImageProvider for BflFluxProvider<A> {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<ImageResult>> {
        let model = required_model(request)?;
        let body = submission_body(request);

        tracing::debug!(
            provider = %self.id(),
            model,
            n = request.count(),
            "starting BFL generation jobs"
        );

        fan_out(request.count() as usize, |index| self.run_job(index, model, &body)).await
    }

    fn id(&self) -> ProviderId {
        ProviderId::BflFlux
    }
}

/// The `model` provider parameter, which also names the submission endpoint
fn required_model(request: &GenerationRequest) -> Result<&str> {
    let model = request.param_str("model").filter(|m| !m.is_empty()).ok_or_else(|| {
        ProviderError::validation(
            "The 'model' parameter is required in provider_params for BFL FLUX (e.g., 'flux-kontext-pro').",
        )
    })?;

    let valid = model
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !model.starts_with('.');

    if !valid {
        return Err(ProviderError::validation(format!(
            "The 'model' parameter '{model}' is not a valid BFL model name."
        )));
    }

    Ok(model)
}

/// Prompt plus every provider parameter except `model`, plus the input image
fn submission_body(request: &GenerationRequest) -> ProviderParams {
    let mut body: ProviderParams = request
        .provider_params()
        .iter()
        .filter(|(key, _)| key.as_str() != "model")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    body.insert("prompt".to_string(), Value::from(request.prompt()));

    if let Some(image) = request.input_image() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        body.insert("input_image".to_string(), Value::from(encoded));
    }

    body
}

fn ready_image(model: &str, job: &GenerationJob, response: PollResponse) -> Result<ImageResult> {
    let sample = response
        .result
        .as_ref()
        .and_then(|result| result.get("sample"))
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::internal("Generation succeeded but no result URL was found."))?;

    let mut image = ImageResult::new(sample).with_metadata("model", model);

    if let Some(id) = response.id.or_else(|| job.task_id().map(str::to_owned)) {
        image = image.with_metadata("request_id", id);
    }

    Ok(image)
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
