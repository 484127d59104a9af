//! # Request/Response Tracing
//!
//! `tower_http::trace::TraceLayer` with one span per request carrying the
//! method and path. Response status and latency are logged at `info`.

use axum::http::Request;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnResponse, MakeSpan, TraceLayer};
use tracing::{Level, Span};

/// Span per request with method and path. Query strings are left out.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}

/// Build the `TraceLayer` for the payroll API.
pub fn layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan> {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_response(DefaultOnResponse::new().level(Level::INFO))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_omits_query_string() {
        let request = Request::builder()
            .uri("/v1/users/token?password=x")
            .body(())
            .unwrap();
        let _span = RequestSpan.make_span(&request);
        let _layer = layer();
    }
}
