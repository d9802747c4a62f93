//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (axum::serve)
//!     → server.rs (gate: OPTIONS, missing/invalid `url`)
//!     → request.rs (extract `url` parameter)
//!     → dispatch subsystem (resolve, registry, forward)
//!     → response.rs (CORS headers, plain-text errors)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use server::{AppState, HttpServer};
