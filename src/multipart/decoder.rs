//! Line-oriented multipart/form-data decoder.
//!
//! # Responsibilities
//! - Split the incoming body segments into lines
//! - Detect `--boundary` delimiters and the closing `--boundary--`
//! - Parse `Content-Disposition` for `name` and `filename`
//! - Route part content to a memory or file sink
//!
//! # Design Decisions
//! - At most one sink is open at a time; it is closed before the next part
//!   begins and before decoding returns
//! - The line break preceding a delimiter belongs to the delimiter, so part
//!   content never ends with a stray newline
//! - Any sink failure fails the whole decode

use std::path::{Path, PathBuf};

use futures_util::{Stream, StreamExt};

use crate::multipart::sink::Sink;
use crate::multipart::{boundary_from_content_type, FormData, MultipartError};

#[derive(Debug, Default)]
struct Disposition {
    name: Option<String>,
    filename: Option<String>,
}

#[derive(Debug)]
enum PartState {
    Preamble,
    Headers(Disposition),
    Content { sink: Option<Sink>, first_line: bool },
    Epilogue,
}

/// Decodes one multipart body into [`FormData`].
#[derive(Debug, Clone)]
pub struct MultipartDecoder {
    boundary: String,
    upload_dir: PathBuf,
}

impl MultipartDecoder {
    pub fn new(boundary: impl Into<String>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            boundary: boundary.into(),
            upload_dir: upload_dir.into(),
        }
    }

    /// Build a decoder from a record's Content-Type header.
    pub fn from_content_type(
        content_type: Option<&str>,
        upload_dir: impl Into<PathBuf>,
    ) -> Result<Self, MultipartError> {
        let content_type = content_type.ok_or(MultipartError::MissingBoundary)?;
        let boundary = boundary_from_content_type(content_type)?;
        Ok(Self::new(boundary, upload_dir))
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Consume the body stream and return the decoded fields.
    pub async fn decode<S>(&self, mut body: S) -> Result<FormData, MultipartError>
    where
        S: Stream<Item = String> + Unpin,
    {
        let mut run = DecodeRun {
            delimiter: format!("--{}", self.boundary),
            upload_dir: &self.upload_dir,
            state: PartState::Preamble,
            form: FormData::new(),
        };

        let mut carry = String::new();
        while let Some(segment) = body.next().await {
            carry.push_str(&segment);
            while let Some(pos) = carry.find('\n') {
                let line: String = carry.drain(..=pos).collect();
                run.on_line(trim_line_end(&line)).await?;
            }
        }
        if !carry.is_empty() {
            run.on_line(trim_line_end(&carry)).await?;
        }

        run.finish().await
    }
}

struct DecodeRun<'a> {
    delimiter: String,
    upload_dir: &'a Path,
    state: PartState,
    form: FormData,
}

impl DecodeRun<'_> {
    async fn on_line(&mut self, line: &str) -> Result<(), MultipartError> {
        let marker = line.trim_end();
        if marker == self.delimiter {
            self.close_current().await?;
            self.state = PartState::Headers(Disposition::default());
            return Ok(());
        }
        if marker.strip_suffix("--") == Some(self.delimiter.as_str()) {
            self.close_current().await?;
            self.state = PartState::Epilogue;
            return Ok(());
        }

        match &mut self.state {
            PartState::Preamble | PartState::Epilogue => {}
            PartState::Headers(disposition) => {
                if line.trim().is_empty() {
                    let disposition = std::mem::take(disposition);
                    let sink = self.open_sink(disposition).await?;
                    self.state = PartState::Content {
                        sink,
                        first_line: true,
                    };
                } else if let Some((name, value)) = line.split_once(':') {
                    if name.trim().eq_ignore_ascii_case("content-disposition") {
                        *disposition = parse_disposition(value);
                    }
                }
            }
            PartState::Content { sink, first_line } => {
                if let Some(sink) = sink.as_mut() {
                    if !*first_line {
                        sink.write("\n").await?;
                    }
                    sink.write(line).await?;
                }
                *first_line = false;
            }
        }
        Ok(())
    }

    async fn open_sink(&self, disposition: Disposition) -> Result<Option<Sink>, MultipartError> {
        let Some(name) = disposition.name else {
            tracing::warn!("Skipping multipart part without a field name");
            return Ok(None);
        };
        let sink = match disposition.filename {
            Some(filename) => Sink::file(&name, &filename, self.upload_dir).await?,
            None => Sink::memory(name),
        };
        Ok(Some(sink))
    }

    async fn close_current(&mut self) -> Result<(), MultipartError> {
        let state = std::mem::replace(&mut self.state, PartState::Epilogue);
        if let PartState::Content { sink: Some(sink), .. } = state {
            let field = sink.close().await?;
            tracing::debug!(field = %field.name, "Multipart field decoded");
            self.form.insert(field);
        }
        Ok(())
    }

    async fn finish(mut self) -> Result<FormData, MultipartError> {
        self.close_current().await?;
        Ok(self.form)
    }
}

fn trim_line_end(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Parse the value of a Content-Disposition part header.
fn parse_disposition(value: &str) -> Disposition {
    let mut disposition = Disposition::default();
    for param in value.split(';').skip(1) {
        let Some((key, val)) = param.split_once('=') else {
            continue;
        };
        let val = val.trim().trim_matches('"').to_string();
        match key.trim().to_ascii_lowercase().as_str() {
            "name" => disposition.name = Some(val),
            "filename" => disposition.filename = Some(val),
            _ => {}
        }
    }
    disposition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::FormValue;

    fn segments(body: &str) -> impl Stream<Item = String> + Unpin {
        futures_util::stream::iter(
            body.split_inclusive('\n')
                .map(str::to_string)
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_parse_disposition() {
        let d = parse_disposition(" form-data; name=\"doc\"; filename=\"a b.txt\"");
        assert_eq!(d.name.as_deref(), Some("doc"));
        assert_eq!(d.filename.as_deref(), Some("a b.txt"));

        let d = parse_disposition("form-data; name=plain");
        assert_eq!(d.name.as_deref(), Some("plain"));
        assert!(d.filename.is_none());
    }

    #[tokio::test]
    async fn test_decode_text_and_file_fields() {
        let dir = tempfile::tempdir().unwrap();
        let body = "--XYZ\n\
                    Content-Disposition: form-data; name=\"foo\"\n\
                    \n\
                    bar\n\
                    --XYZ\n\
                    Content-Disposition: form-data; name=\"doc\"; filename=\"notes.txt\"\n\
                    Content-Type: text/plain\n\
                    \n\
                    first\n\
                    second\n\
                    --XYZ--\n";

        let decoder = MultipartDecoder::new("XYZ", dir.path());
        let form = decoder.decode(segments(body)).await.unwrap();

        assert_eq!(form.len(), 2);
        assert_eq!(form.get("foo"), Some(&FormValue::Text("bar".into())));

        let stored = dir.path().join("upload_doc_notes.txt");
        assert_eq!(
            form.get("doc"),
            Some(&FormValue::File {
                filename: "notes.txt".into(),
                storage_path: stored.clone(),
            })
        );
        // Sink is closed before decode returns, so the content is complete.
        assert_eq!(std::fs::read_to_string(stored).unwrap(), "first\nsecond");
    }

    #[tokio::test]
    async fn test_segments_split_mid_line() {
        let dir = tempfile::tempdir().unwrap();
        let parts = vec![
            "--XY".to_string(),
            "Z\r\nContent-Disposition: form-data; na".to_string(),
            "me=\"foo\"\r\n\r\nb".to_string(),
            "ar\r\n--XYZ--".to_string(),
        ];
        let decoder = MultipartDecoder::new("XYZ", dir.path());
        let form = decoder
            .decode(futures_util::stream::iter(parts))
            .await
            .unwrap();
        assert_eq!(form.get("foo"), Some(&FormValue::Text("bar".into())));
    }

    #[tokio::test]
    async fn test_unterminated_body_closes_open_sink() {
        let dir = tempfile::tempdir().unwrap();
        let body = "--XYZ\nContent-Disposition: form-data; name=\"foo\"\n\nbar";
        let decoder = MultipartDecoder::new("XYZ", dir.path());
        let form = decoder.decode(segments(body)).await.unwrap();
        assert_eq!(form.get("foo"), Some(&FormValue::Text("bar".into())));
    }

    #[tokio::test]
    async fn test_duplicate_field_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let body = "--XYZ\nContent-Disposition: form-data; name=\"a\"\n\none\n\
                    --XYZ\nContent-Disposition: form-data; name=\"a\"\n\ntwo\n--XYZ--\n";
        let decoder = MultipartDecoder::new("XYZ", dir.path());
        let form = decoder.decode(segments(body)).await.unwrap();
        assert_eq!(form.len(), 1);
        assert_eq!(form.get("a"), Some(&FormValue::Text("two".into())));
    }

    #[tokio::test]
    async fn test_file_sink_failure_fails_decode() {
        let dir = tempfile::tempdir().unwrap();
        let body = "--XYZ\nContent-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\n\nx\n--XYZ--\n";
        let decoder = MultipartDecoder::new("XYZ", dir.path().join("missing"));
        let err = decoder.decode(segments(body)).await.unwrap_err();
        assert!(matches!(err, MultipartError::Sink { .. }));
    }

    #[test]
    fn test_from_content_type_requires_boundary() {
        assert!(matches!(
            MultipartDecoder::from_content_type(None, "."),
            Err(MultipartError::MissingBoundary)
        ));
        let decoder =
            MultipartDecoder::from_content_type(Some("multipart/form-data; boundary=b1"), ".").unwrap();
        assert_eq!(decoder.boundary(), "b1");
    }
}
