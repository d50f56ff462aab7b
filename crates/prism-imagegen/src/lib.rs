#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions
)]

mod dispatch;
mod error;
mod fanout;
mod http_client;
mod job;
mod provider;
mod types;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};

pub use dispatch::{Dispatcher, DispatcherBuilder};
pub use error::{ErrorKind, ProviderError, Result};
pub use prism_config::ProviderId;
pub use types::{
    GatewayResponse, GenerationPayload, GenerationRequest, ImageResult, MAX_IMAGES, ProviderParams, ResponseStatus,
};

/// Build the dispatcher from configuration
///
/// # Errors
///
/// Returns an error if a provider fails to initialize
pub fn build_dispatcher(config: &prism_config::Config) -> anyhow::Result<Arc<Dispatcher>> {
    let dispatcher = Arc::new(
        DispatcherBuilder::new(config)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to initialize image generation dispatcher: {e}"))?,
    );
    Ok(dispatcher)
}

/// Create the endpoint router for image generation
pub fn endpoint_router() -> Router<Arc<Dispatcher>> {
    Router::new().route("/v1/images/generations", post(generate))
}

/// Handle image generation requests
async fn generate(
    State(dispatcher): State<Arc<Dispatcher>>,
    payload: std::result::Result<Json<GenerationPayload>, JsonRejection>,
) -> Result<Json<GatewayResponse>> {
    let Json(payload) = payload.map_err(|rejection| ProviderError::validation(rejection.body_text()))?;

    tracing::debug!(
        provider = %payload.provider,
        n = payload.n,
        user_id = payload.user_id.as_deref().unwrap_or("-"),
        "Image generation handler called"
    );

    let request = GenerationRequest::try_from(payload)?;
    let response = dispatcher.generate(&request).await?;

    Ok(Json(response))
}
