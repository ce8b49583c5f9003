//! Engine-wide types and error definitions.

use std::path::PathBuf;

use thiserror::Error;

use crate::multipart::{FormData, MultipartError};

/// Errors that abort a single request. None of them stop the dispatch of
/// the remaining records.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `<path` directive points at a file that cannot be read.
    #[error("failed to read body file {path}: {source}")]
    BodyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Multipart decoding failed.
    #[error("multipart decoding failed: {0}")]
    Multipart(#[from] MultipartError),

    /// Buffering a streamed body to its temp file failed.
    #[error("failed to buffer body to {path}: {source}")]
    Buffer {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target cannot be turned into an absolute URL.
    #[error("invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// Connection, DNS or protocol failure while executing.
    #[error("{method} {target} failed: {source}")]
    Transport {
        method: String,
        target: String,
        #[source]
        source: reqwest::Error,
    },
}

impl EngineError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::BodyRead { .. } => "body_read",
            EngineError::Multipart(_) => "multipart",
            EngineError::Buffer { .. } => "buffer",
            EngineError::InvalidTarget { .. } => "invalid_target",
            EngineError::Transport { .. } => "transport",
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Body ready to be put on the wire.
#[derive(Debug)]
pub enum ResolvedBody {
    Empty,
    /// Fully buffered text.
    Text(String),
    /// Decoded multipart fields, passed through as-is.
    Form(FormData),
    /// Reopened temp file, piped to the transport.
    Stream(tokio::fs::File),
}

impl ResolvedBody {
    pub fn is_stream(&self) -> bool {
        matches!(self, ResolvedBody::Stream(_))
    }

    /// Bytes sent for a buffered body. Form fields go out as a JSON object.
    pub fn to_wire(&self) -> Option<String> {
        match self {
            ResolvedBody::Empty => Some(String::new()),
            ResolvedBody::Text(text) => Some(text.clone()),
            ResolvedBody::Form(form) => Some(form.to_json().to_string()),
            ResolvedBody::Stream(_) => None,
        }
    }
}

/// Response body as kept for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Text(String),
    /// Image content: drained but not decoded.
    Binary { content_type: String, length: usize },
}

/// A fully received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub protocol: String,
    pub status: u16,
    /// Headers in the order the transport delivered them.
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
}

impl Response {
    /// First header with this name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// Counts for one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub invalid: usize,
}

impl DispatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.invalid
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.invalid == 0
    }
}
