//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → broadcast → watch loop finishes the current pass → exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
