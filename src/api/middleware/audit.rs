//! Audit logging middleware.
//!
//! Logs every API request with clinic, method, path, response status
//! and latency.

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::middleware::clinic::CLINIC_HEADER;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let clinic = req
        .headers()
        .get(CLINIC_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if response.status().is_server_error() {
        tracing::warn!(%method, %path, %clinic, status, elapsed_ms, "api request");
    } else {
        tracing::info!(%method, %path, %clinic, status, elapsed_ms, "api request");
    }
    response
}
