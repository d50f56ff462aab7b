use std::time::Duration;

use axum::http;
use reqwest::Client;

/// Build the pooled HTTP client owned by one provider instance
///
/// `timeout` bounds every call made through the client, including reading
/// the response body.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    let mut headers = http::HeaderMap::new();
    headers.insert(http::header::CONNECTION, http::HeaderValue::from_static("keep-alive"));
    headers.insert(http::header::ACCEPT, http::HeaderValue::from_static("application/json"));

    Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Some(Duration::from_secs(30)))
        .tcp_nodelay(true)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .default_headers(headers)
        .build()
}
