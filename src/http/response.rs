//! Client-facing responses produced by the proxy itself.
//!
//! # Responsibilities
//! - Attach the CORS headers to every response, proxied or not
//! - Answer preflight requests
//! - Render dispatch errors as plain text

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::dispatch::ProxyError;

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "GET, HEAD, OPTIONS";
pub const ALLOW_HEADERS: &str = "Origin, X-Requested-With, Content-Type";

/// Wrap `router` so every response carries the CORS headers.
///
/// Values from the origin are overridden.
pub fn with_cors_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(ALLOW_ORIGIN),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        ))
}

/// `204 No Content` for CORS preflight.
pub fn preflight() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Plain-text response with the given status.
pub fn plain_text(status: StatusCode, message: &'static str) -> Response {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        plain_text(self.status_code(), self.client_message())
    }
}
