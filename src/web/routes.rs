//! Web API router construction.

use axum::{
    Router,
    extract::Request,
    http::StatusCode,
    response::Response,
    routing::{get, post},
};
use std::time::Duration;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::Span;

use crate::state::AppState;
use crate::web::{schedule, session, status};

/// Browser-driven endpoints launch Chromium and log in; give them room.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .route("/cookie", post(session::issue_cookie))
        .route("/schedule/current", get(schedule::current))
        .route("/schedule/all", get(schedule::all))
        .route("/schedule/matrix", get(schedule::matrix))
        .with_state(app_state)
        .layer((
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_request(|_: &Request, _: &Span| {})
                .on_response(log_response),
            timeout_layer(REQUEST_TIMEOUT),
        ))
}

/// Requests running past `timeout` are answered with 408.
fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Severity-proportional response logging.
fn log_response(response: &Response, latency: Duration, _span: &Span) {
    let status = response.status().as_u16();
    let duration_ms = latency.as_millis() as u64;
    match status {
        200..=399 => tracing::debug!(status, duration_ms, "Response"),
        400..=499 => tracing::info!(status, duration_ms, "Response"),
        _ => tracing::warn!(status, duration_ms, "Response"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_slow_request_times_out_with_408() {
        let router = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "done"
                }),
            )
            .route("/fast", get(|| async { "done" }))
            .layer(timeout_layer(Duration::from_millis(100)));
        let base = serve(router).await;

        let slow = reqwest::get(format!("{base}/slow")).await.unwrap();
        assert_eq!(slow.status(), reqwest::StatusCode::REQUEST_TIMEOUT);

        let fast = reqwest::get(format!("{base}/fast")).await.unwrap();
        assert_eq!(fast.status(), reqwest::StatusCode::OK);
    }
}
