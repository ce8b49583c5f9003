//! Request-file HTTP execution engine.
//!
//! Parses plain-text buffers of HTTP request descriptions, resolves their
//! bodies (inline, file reference, chunked, multipart), sends them and
//! renders each response in order.

pub mod config;
pub mod engine;
pub mod lifecycle;
pub mod multipart;
pub mod observability;
pub mod parser;
pub mod watch;

pub use config::EngineConfig;
pub use engine::{DispatchSummary, Dispatcher};
pub use lifecycle::Shutdown;
pub use parser::{parse_requests, RequestRecord};
