/// Liveness probe, answers as long as the process serves requests
pub async fn health_handler() -> &'static str {
    "ok"
}
