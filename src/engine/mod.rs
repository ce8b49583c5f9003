//! Request execution engine.
//!
//! # Data Flow
//! ```text
//! text buffer
//!     → parser (ordered RequestRecords)
//!     → dispatcher.rs (one record at a time)
//!         → resolver.rs (BodySource → ResolvedBody, Content-Length)
//!         → executor.rs (network call, full response)
//!         → render.rs (status, headers, body to output)
//! ```

pub mod dispatcher;
pub mod executor;
pub mod render;
pub mod resolver;
pub mod types;

pub use dispatcher::Dispatcher;
pub use types::{DispatchSummary, EngineError, EngineResult, Response, ResponseBody};
