//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Finish in-flight forwards → Drain handler registry
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
