//! Tokenizer state machine for request files.
//!
//! # States
//! ```text
//! RequestLine ──non-blank──▶ Headers ──blank──▶ Body ──body complete──▶ RequestLine
//!      ▲                                          │
//!      └──────────── method-token line ───────────┘ (record finalized, new one begins)
//!
//! input exhausted ──▶ End
//! ```
//!
//! # Design Decisions
//! - One synchronous pass over the buffer, line by line
//! - Each record gets a freshly allocated header map
//! - Malformed request lines are best-effort: missing parts stay empty and
//!   are rejected later by the dispatcher

use crate::parser::body::{BodyExtractor, Feed, Framing};
use crate::parser::record::{
    is_known_method, is_multipart_content_type, BodySource, Headers, RequestRecord, DEFAULT_PROTOCOL,
};

/// Tokenizer state. `Body` owns the extractor for the open record.
#[derive(Debug)]
pub enum ParseState {
    RequestLine,
    Headers,
    Body(BodyExtractor),
    End,
}

/// A record under construction.
#[derive(Debug, Default)]
struct RecordBuilder {
    method: String,
    target: String,
    protocol_version: String,
    headers: Headers,
}

impl RecordBuilder {
    fn from_request_line(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let method = parts.next().unwrap_or_default().to_string();
        let target = parts.next().unwrap_or_default().to_string();
        let protocol_version = parts.next().unwrap_or(DEFAULT_PROTOCOL).to_string();

        if target.is_empty() {
            tracing::warn!(line = %line, "Request line has no target");
        }

        Self {
            method,
            target,
            protocol_version,
            headers: Headers::new(),
        }
    }

    fn is_complete(&self) -> bool {
        !self.method.is_empty() && !self.target.is_empty()
    }

    fn finish(self, body: BodySource) -> RequestRecord {
        RequestRecord {
            method: self.method,
            target: self.target,
            protocol_version: self.protocol_version,
            headers: self.headers,
            body,
        }
    }
}

/// Mid-body "new request" heuristic.
///
/// A body line whose leading whitespace-delimited token is a known HTTP
/// method ends the current record and starts a new one, which is what lets
/// several requests share one file without separators.
///
/// Known misclassification: body text that happens to begin with a method
/// word (e.g. a plain-text line "GET well soon") is taken as a new request.
/// This is the documented file-format rule and must stay as is.
pub fn starts_new_request(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .map(is_known_method)
        .unwrap_or(false)
}

/// Line-driven tokenizer producing [`RequestRecord`]s in input order.
#[derive(Debug)]
pub struct Tokenizer {
    state: ParseState,
    current: Option<RecordBuilder>,
    records: Vec<RequestRecord>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            state: ParseState::RequestLine,
            current: None,
            records: Vec::new(),
        }
    }

    pub fn state(&self) -> &ParseState {
        &self.state
    }

    /// Apply one line to the state machine.
    pub fn feed(&mut self, line: &str) {
        let state = std::mem::replace(&mut self.state, ParseState::End);
        self.state = self.transition(state, line);
    }

    fn transition(&mut self, state: ParseState, line: &str) -> ParseState {
        let trimmed = line.trim();
        match state {
            ParseState::RequestLine => {
                if trimmed.is_empty() {
                    return ParseState::RequestLine;
                }
                self.current = Some(RecordBuilder::from_request_line(trimmed));
                ParseState::Headers
            }
            ParseState::Headers => {
                let Some(builder) = self.current.as_mut() else {
                    return ParseState::RequestLine;
                };
                if trimmed.is_empty() {
                    let framing = Framing::from_headers(&builder.headers);
                    return ParseState::Body(BodyExtractor::new(framing));
                }
                match trimmed.split_once(": ") {
                    Some((name, value)) => builder.headers.insert(name, value),
                    None => tracing::warn!(line = %trimmed, "Skipping malformed header line"),
                }
                ParseState::Headers
            }
            ParseState::Body(mut extractor) => {
                // The heuristic runs before any framing policy.
                if starts_new_request(trimmed) {
                    self.finalize(extractor, true);
                    self.current = Some(RecordBuilder::from_request_line(trimmed));
                    return ParseState::Headers;
                }
                match extractor.feed(line) {
                    Feed::Consumed => ParseState::Body(extractor),
                    Feed::Complete => {
                        self.finalize(extractor, true);
                        ParseState::RequestLine
                    }
                    Feed::Rejected => {
                        self.finalize(extractor, true);
                        self.transition(ParseState::RequestLine, line)
                    }
                }
            }
            ParseState::End => ParseState::End,
        }
    }

    fn finalize(&mut self, extractor: BodyExtractor, always: bool) {
        if let Some(builder) = self.current.take() {
            if always || builder.is_complete() {
                let multipart = builder
                    .headers
                    .get("Content-Type")
                    .map(is_multipart_content_type)
                    .unwrap_or(false);
                let body = extractor.finish(multipart);
                self.records.push(builder.finish(body));
            }
        }
    }

    /// Close any open record and return all records.
    pub fn finish(mut self) -> Vec<RequestRecord> {
        let state = std::mem::replace(&mut self.state, ParseState::End);
        match state {
            ParseState::Body(extractor) => self.finalize(extractor, false),
            ParseState::Headers => {
                // Input ended before the blank line: no body.
                self.finalize(BodyExtractor::new(Framing::Unbounded), false)
            }
            ParseState::RequestLine | ParseState::End => {}
        }
        self.records
    }
}

/// Parse a whole request-file buffer.
pub fn parse_requests(content: &str) -> Vec<RequestRecord> {
    let mut tokenizer = Tokenizer::new();
    for line in content.split('\n') {
        tokenizer.feed(line.strip_suffix('\r').unwrap_or(line));
    }
    let records = tokenizer.finish();
    tracing::debug!(count = records.len(), "Parsed request file");
    records
}
