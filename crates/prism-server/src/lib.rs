mod auth;
mod health;

use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use prism_config::Config;
use tower_http::trace::TraceLayer;

pub use auth::{ApiKeyAuth, AuthError};

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if an image provider fails to initialize or the
    /// auth header name is invalid
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let listen_address = config.server.listen_address();

        let dispatcher = prism_imagegen::build_dispatcher(config)?;

        let mut app = Router::new();

        // Health check
        if config.server.health.enabled {
            app = app.route(&config.server.health.path, axum::routing::get(health::health_handler));
        }

        // Image generation routes
        app = app.merge(prism_imagegen::endpoint_router().with_state(dispatcher));

        // Tracing
        app = app.layer(TraceLayer::new_for_http());

        // API key authentication
        if let Some(ref auth_config) = config.auth
            && auth_config.enabled
        {
            let auth = Arc::new(ApiKeyAuth::new(auth_config.clone())?);
            app = app.layer(axum::middleware::from_fn(move |req, next| {
                let auth = Arc::clone(&auth);
                async move { auth::auth_middleware(auth, req, next).await }
            }));
        } else {
            tracing::warn!("gateway API key authentication is disabled");
        }

        Ok(Self {
            router: app,
            listen_address,
        })
    }

    /// Replace the listen address (e.g. from the command line)
    #[must_use]
    pub const fn with_listen_address(mut self, listen_address: SocketAddr) -> Self {
        self.listen_address = listen_address;
        self
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}
