//! Request-file parsing subsystem.
//!
//! # Data Flow
//! ```text
//! text buffer
//!     → state.rs (line-driven state machine, request boundaries)
//!     → body.rs (Content-Length / chunked / unbounded extraction)
//!     → record.rs (finalized RequestRecord, owned headers, BodySource)
//! ```

pub mod body;
pub mod record;
pub mod state;

pub use record::{BodySource, BodyStream, Headers, RequestRecord};
pub use state::{parse_requests, Tokenizer};
