//! Request forwarding.
//!
//! # Data Flow
//! ```text
//! inbound Request<Body> + Target
//!     → strip hop-by-hop headers and Host
//!     → rewrite to origin + target path/query
//!     → handler client (idle timeout until headers)
//!     → ForwardOutcome::Forwarded(streamed response) | ForwardOutcome::Failed(cause)
//! ```
//!
//! The upstream timeout bounds inactivity, not the whole exchange: a body that
//! keeps delivering data streams for as long as it takes, while a gap longer
//! than the timeout between chunks ends it.
//!
//! A failure in the response body after headers went out cannot be turned into
//! a 502 any more; it is logged and counted against the origin and the body
//! ends early.

use std::io;
use std::time::Duration;

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{header, HeaderMap, HeaderName, Request, Response};
use futures_util::{Stream, StreamExt, TryStreamExt};

use crate::dispatch::error::ProxyError;
use crate::dispatch::handler::{ForwardingHandler, OriginHandler};
use crate::dispatch::origin::Target;
use crate::observability::metrics;

/// Failure kind recorded when the response body breaks after headers were sent.
pub const BODY_FAILURE_KIND: &str = "upstream_body";

/// Headers that describe a single connection and must not be relayed.
static HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Result of relaying one request.
#[derive(Debug)]
pub enum ForwardOutcome {
    /// The origin answered; its response is ready to stream to the client.
    Forwarded(Response<Body>),
    /// No response was obtained from the origin.
    Failed(ProxyError),
}

/// Relay `request` to the origin of `target` using `handler`.
pub async fn forward(
    request: Request<Body>,
    target: &Target,
    handler: &ForwardingHandler,
) -> ForwardOutcome {
    let (parts, body) = request.into_parts();
    let url = handler.upstream_url(target);

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    // The client sets Host from the upstream URL.
    headers.remove(header::HOST);

    tracing::debug!(
        origin = %handler.origin(),
        method = %parts.method,
        path = %target.path_and_query(),
        "Forwarding request"
    );

    let mut upstream = handler
        .client()
        .request(parts.method, url)
        .headers(headers);

    if body.size_hint().exact() != Some(0) {
        upstream = upstream.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let idle = handler.idle_timeout();
    match tokio::time::timeout(idle, upstream.send()).await {
        Ok(Ok(response)) => ForwardOutcome::Forwarded(into_client_response(response, handler)),
        Ok(Err(source)) => ForwardOutcome::Failed(ProxyError::Upstream {
            origin: handler.origin().clone(),
            source,
        }),
        Err(_) => ForwardOutcome::Failed(ProxyError::UpstreamIdle {
            origin: handler.origin().clone(),
            idle,
        }),
    }
}

fn into_client_response(upstream: reqwest::Response, handler: &ForwardingHandler) -> Response<Body> {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);

    let origin = handler.origin().clone();
    let stream = with_idle_timeout(Box::pin(upstream.bytes_stream()), handler.idle_timeout())
        .inspect_err(move |err| {
            tracing::error!(
                origin = %origin,
                error = %err,
                "Upstream body failed after response headers were sent"
            );
            metrics::record_forward_failure(BODY_FAILURE_KIND);
        });

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Relay `chunks` until they end, fail, or stay silent for longer than `idle`.
///
/// The stream stops after the first error.
pub(crate) fn with_idle_timeout<S>(
    chunks: S,
    idle: Duration,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + Unpin + 'static,
{
    futures_util::stream::unfold(Some(chunks), move |state| async move {
        let mut chunks = state?;
        match tokio::time::timeout(idle, chunks.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(chunks))),
            Ok(Some(Err(err))) => Some((Err(io::Error::other(err)), None)),
            Ok(None) => None,
            Err(_) => Some((
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no body data for {}ms", idle.as_millis()),
                )),
                None,
            )),
        }
    })
}

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub(crate) fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}
