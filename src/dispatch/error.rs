//! Error taxonomy for the dispatcher.
//!
//! Every variant is terminal for the request that produced it. The client only
//! ever sees [`ProxyError::client_message`]; the `Display` form carries the
//! diagnostic detail and is meant for logs.

use std::error::Error as _;
use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

use crate::dispatch::origin::OriginKey;

/// Body returned when the `url` query parameter is absent.
pub const USAGE_MESSAGE: &str = "Specify the target with the ?url= query parameter \
    (e.g. http://localhost:3000/?url=https://example.com/image.jpg)";

/// Body returned when the `url` query parameter is not an absolute http(s) URL.
pub const INVALID_TARGET_MESSAGE: &str = "Invalid target URL format";

/// Body returned when the origin could not be reached or read.
pub const FORWARD_FAILED_MESSAGE: &str =
    "Proxy forwarding failed, check that the target URL is valid and reachable";

/// Errors that can occur while dispatching a single request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The inbound request carried no `url` parameter.
    #[error("missing `url` query parameter")]
    MissingTarget,

    /// The `url` parameter is not an absolute http(s) URL.
    #[error("invalid target url {input:?}: {reason}")]
    InvalidTarget { input: String, reason: String },

    /// Contacting or reading from the origin failed.
    #[error("upstream {origin} failed: {source}")]
    Upstream {
        origin: OriginKey,
        #[source]
        source: reqwest::Error,
    },

    /// The origin sent nothing for longer than the upstream timeout before
    /// response headers arrived.
    #[error("upstream {origin} idle for more than {}ms", idle.as_millis())]
    UpstreamIdle { origin: OriginKey, idle: Duration },

    /// The forwarding handler for an origin could not be built.
    #[error("failed to build handler for {origin}: {source}")]
    HandlerConstruction {
        origin: OriginKey,
        #[source]
        source: reqwest::Error,
    },
}

impl ProxyError {
    pub(crate) fn invalid_target(input: &str, reason: impl ToString) -> Self {
        Self::InvalidTarget {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Status code presented to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::MissingTarget | ProxyError::InvalidTarget { .. } => StatusCode::BAD_REQUEST,
            ProxyError::Upstream { .. }
            | ProxyError::UpstreamIdle { .. }
            | ProxyError::HandlerConstruction { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Plain-text body presented to the client.
    pub fn client_message(&self) -> &'static str {
        match self {
            ProxyError::MissingTarget => USAGE_MESSAGE,
            ProxyError::InvalidTarget { .. } => INVALID_TARGET_MESSAGE,
            ProxyError::Upstream { .. }
            | ProxyError::UpstreamIdle { .. }
            | ProxyError::HandlerConstruction { .. } => FORWARD_FAILED_MESSAGE,
        }
    }

    /// Origin the failure is attributed to, if it got that far.
    pub fn origin(&self) -> Option<&OriginKey> {
        match self {
            ProxyError::Upstream { origin, .. }
            | ProxyError::UpstreamIdle { origin, .. }
            | ProxyError::HandlerConstruction { origin, .. } => Some(origin),
            _ => None,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::MissingTarget => "missing_target",
            ProxyError::InvalidTarget { .. } => "invalid_target",
            ProxyError::Upstream { source, .. } if source.is_timeout() => "timeout",
            ProxyError::Upstream { source, .. } if source.is_connect() => "connect",
            ProxyError::Upstream { .. } => "upstream",
            ProxyError::UpstreamIdle { .. } => "timeout",
            ProxyError::HandlerConstruction { .. } => "handler_construction",
        }
    }

    /// Underlying causes joined with `": "`, innermost last. Empty when the
    /// error has no source.
    pub fn cause_chain(&self) -> String {
        std::iter::successors(self.source(), |&e| e.source())
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(": ")
    }
}
