//! Body extraction for the three framing policies.
//!
//! # Responsibilities
//! - Pick a framing policy from the finished header map
//! - Consume body lines one at a time and report when the body is complete
//! - Classify the collected lines into a [`BodySource`]
//!
//! # Design Decisions
//! - Framing works at line granularity. The request file is always
//!   line-delimited text, so Content-Length may overshoot by part of a line
//!   and chunk sizes are satisfied by whole lines.
//! - Chunked wins over Content-Length when both are declared.

use crate::parser::record::{BodySource, BodyStream, Headers};

/// How the end of a body is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Stop once this many bytes of body lines have been read.
    ContentLength(usize),
    /// Hex size lines followed by payload lines, terminated by size zero.
    Chunked,
    /// Everything up to the next request line or end of input.
    Unbounded,
}

impl Framing {
    /// Derive the framing policy from a completed header map.
    pub fn from_headers(headers: &Headers) -> Self {
        let chunked = headers
            .get("Transfer-Encoding")
            .map(|v| v.trim().eq_ignore_ascii_case("chunked"))
            .unwrap_or(false);
        if chunked {
            return Framing::Chunked;
        }

        // Unparsable lengths count as zero.
        let length = headers
            .get("Content-Length")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if length > 0 {
            Framing::ContentLength(length)
        } else {
            Framing::Unbounded
        }
    }
}

/// Outcome of feeding one line to the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// The line belongs to the body; more may follow.
    Consumed,
    /// The line belongs to the body and completed it.
    Complete,
    /// The line is not part of the body. The body is complete and the
    /// caller must process the line again as something else.
    Rejected,
}

#[derive(Debug)]
enum ChunkState {
    Size,
    /// `lines` counts payload lines taken so far, blank ones included.
    Payload { size: usize, buf: String, lines: usize },
}

/// Accumulates body lines for one record.
#[derive(Debug)]
pub struct BodyExtractor {
    framing: Framing,
    lines: Vec<String>,
    chunks: Vec<String>,
    chunk: ChunkState,
    remaining: i64,
    complete: bool,
}

impl BodyExtractor {
    pub fn new(framing: Framing) -> Self {
        let remaining = match framing {
            Framing::ContentLength(n) => n as i64,
            _ => 0,
        };
        Self {
            framing,
            lines: Vec::new(),
            chunks: Vec::new(),
            chunk: ChunkState::Size,
            remaining,
            complete: false,
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Feed one body line (without its terminator).
    pub fn feed(&mut self, line: &str) -> Feed {
        if self.complete {
            return Feed::Rejected;
        }
        match self.framing {
            Framing::ContentLength(_) => {
                self.lines.push(line.to_string());
                self.remaining -= line.len() as i64;
                if self.remaining <= 0 {
                    self.complete = true;
                    Feed::Complete
                } else {
                    Feed::Consumed
                }
            }
            Framing::Chunked => self.feed_chunked(line),
            Framing::Unbounded => {
                self.lines.push(line.to_string());
                Feed::Consumed
            }
        }
    }

    fn feed_chunked(&mut self, line: &str) -> Feed {
        match &mut self.chunk {
            ChunkState::Size => {
                let token = line.trim();
                if token.is_empty() {
                    return Feed::Consumed;
                }
                // Chunk extensions after ';' are ignored.
                let token = token.split(';').next().unwrap_or("").trim();
                match usize::from_str_radix(token, 16) {
                    Ok(0) => {
                        self.complete = true;
                        Feed::Complete
                    }
                    Ok(size) => {
                        self.chunk = ChunkState::Payload {
                            size,
                            buf: String::new(),
                            lines: 0,
                        };
                        Feed::Consumed
                    }
                    Err(_) => {
                        tracing::warn!(line = %line, "Invalid chunk size, ending chunked body");
                        self.complete = true;
                        Feed::Rejected
                    }
                }
            }
            ChunkState::Payload { size, buf, lines } => {
                if *lines > 0 {
                    buf.push('\n');
                }
                buf.push_str(line);
                *lines += 1;
                if buf.len() >= *size {
                    let payload = std::mem::take(buf);
                    self.chunks.push(payload);
                    self.chunk = ChunkState::Size;
                }
                Feed::Consumed
            }
        }
    }

    /// Close the body and classify it.
    ///
    /// `multipart` selects the stream representation for bodies the
    /// multipart decoder will consume.
    pub fn finish(mut self, multipart: bool) -> BodySource {
        if let Framing::Chunked = self.framing {
            // A truncated final chunk is kept as-is.
            if let ChunkState::Payload { buf, .. } = std::mem::replace(&mut self.chunk, ChunkState::Size) {
                if !buf.is_empty() {
                    self.chunks.push(buf);
                }
            }
            let stream = BodyStream::new(self.chunks);
            return if stream.is_empty() {
                BodySource::Empty
            } else {
                BodySource::Stream(stream)
            };
        }

        let mut lines = self.lines;
        match self.framing {
            Framing::Unbounded => trim_blank_lines(&mut lines),
            // Input ended before the declared length was reached.
            _ if !self.complete => trim_trailing_blank_lines(&mut lines),
            _ => {}
        }
        if lines.iter().all(|l| l.trim().is_empty()) {
            return BodySource::Empty;
        }

        if let Some(path) = lines[0].trim_start().strip_prefix('<') {
            return BodySource::FileRef(path.trim().to_string());
        }

        if multipart {
            let last = lines.len() - 1;
            let segments = lines
                .into_iter()
                .enumerate()
                .map(|(i, mut l)| {
                    if i < last {
                        l.push('\n');
                    }
                    l
                })
                .collect();
            return BodySource::Stream(BodyStream::new(segments));
        }

        BodySource::Inline(lines.join("\n"))
    }
}

fn trim_trailing_blank_lines(lines: &mut Vec<String>) {
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
}

fn trim_blank_lines(lines: &mut Vec<String>) {
    trim_trailing_blank_lines(lines);
    let leading = lines.iter().take_while(|l| l.trim().is_empty()).count();
    lines.drain(..leading);
}
