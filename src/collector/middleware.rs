use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::debug;

/// Logs `METHOD path status in Nus` for every collector request
pub async fn log_request_timing(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let response = next.run(request).await;

    debug!(
        "{} {} {} in {}us",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_micros()
    );
    response
}
