//! Request records produced by the tokenizer.
//!
//! # Responsibilities
//! - Hold one parsed request (method, target, version, headers, body)
//! - Own an independent, ordered header map per record
//! - Represent the body as a closed variant instead of a runtime type check

use std::fmt;

/// Protocol version assumed when the request line omits one.
pub const DEFAULT_PROTOCOL: &str = "HTTP/1.1";

/// Methods the engine will execute. Also drives the mid-body
/// "new request" heuristic in the tokenizer.
pub const KNOWN_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS", "HEAD"];

/// Ordered header map.
///
/// Names keep the case they were written with. Inserting a name that is
/// already present (ASCII case-insensitive) replaces the value in place,
/// so the last occurrence wins but the first position is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx] = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.entries[idx].1.as_str())
    }

    /// Remove a header, returning its value if it was present.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|idx| self.entries.remove(idx).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

/// Raw body segments kept in arrival order, consumed later by the resolver.
///
/// The body is the plain concatenation of the segments. Segments carry
/// their own line terminators, so consumers must not add separators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyStream {
    chunks: Vec<String>,
}

impl BodyStream {
    pub fn new(chunks: Vec<String>) -> Self {
        Self { chunks }
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// Turn the segments into an async stream.
    pub fn into_stream(self) -> impl futures_util::Stream<Item = String> + Unpin {
        futures_util::stream::iter(self.chunks)
    }

    /// Total byte length of the concatenated body.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(String::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where a record's body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySource {
    /// No body lines.
    Empty,
    /// Literal text, sent verbatim.
    Inline(String),
    /// `<path` directive: the body is the content of a local file.
    FileRef(String),
    /// Framed or multipart content that the resolver consumes as a stream.
    Stream(BodyStream),
}

impl BodySource {
    pub fn is_empty(&self) -> bool {
        matches!(self, BodySource::Empty)
    }
}

/// One finalized request from a request file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub method: String,
    pub target: String,
    pub protocol_version: String,
    pub headers: Headers,
    pub body: BodySource,
}

impl RequestRecord {
    /// Whether the method is one the engine executes (case-insensitive).
    pub fn is_http_request(&self) -> bool {
        is_known_method(&self.method.to_ascii_uppercase())
    }

    pub fn method_upper(&self) -> String {
        self.method.to_ascii_uppercase()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type")
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type()
            .map(is_multipart_content_type)
            .unwrap_or(false)
    }
}

impl fmt::Display for RequestRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.method, self.target, self.protocol_version)
    }
}

pub fn is_multipart_content_type(content_type: &str) -> bool {
    content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
}

/// Exact match against [`KNOWN_METHODS`].
pub fn is_known_method(token: &str) -> bool {
    KNOWN_METHODS.contains(&token)
}
