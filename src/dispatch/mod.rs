//! Origin-keyed dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! ?url=<target>
//!     → origin.rs (parse target, derive OriginKey)
//!     → registry.rs (existing or newly created handler for the key)
//!     → forwarder.rs (rewrite path, relay through handler.rs)
//!     → ForwardOutcome → client response
//! ```
//!
//! # Design Decisions
//! - One handler per origin, created lazily and kept until shutdown
//! - A failing origin keeps its handler; errors are per request
//! - Forwarding returns an explicit outcome instead of invoking callbacks

pub mod error;
pub mod forwarder;
pub mod handler;
pub mod origin;
pub mod registry;

pub use error::ProxyError;
pub use forwarder::{forward, ForwardOutcome};
pub use handler::{ForwardingHandler, OriginHandler};
pub use origin::{resolve, OriginKey, Target};
pub use registry::HandlerRegistry;
