//! Origin-keyed dynamic reverse proxy.
//!
//! Clients call `GET /?url=<target>`; the request is relayed to the target's
//! origin through a forwarding handler cached per origin.

// Core
pub mod dispatch;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use dispatch::{HandlerRegistry, OriginKey};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
