//! Body resolution.
//!
//! # Responsibilities
//! - Turn a record's [`BodySource`] into a [`ResolvedBody`]
//! - Run the multipart decoder for multipart streams
//! - Buffer other streams to a temp file and reopen it for sending
//! - Read `<path` file-inclusion bodies
//! - Compute outgoing Content-Length for buffered bodies
//!
//! # Design Decisions
//! - Temp files are owned by a [`TempFile`] guard; dropping the prepared
//!   request deletes the file on success and failure alike
//! - Temp names combine a millisecond timestamp with a process-wide counter

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::config::StorageConfig;
use crate::engine::types::{EngineError, EngineResult, ResolvedBody};
use crate::multipart::MultipartDecoder;
use crate::parser::record::{BodySource, BodyStream, Headers, RequestRecord};

/// Methods that get an explicit Content-Length for buffered bodies.
const LENGTH_METHODS: [&str; 3] = ["POST", "PUT", "PATCH"];

/// Sequence number appended to temp file names.
static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Guard that deletes a temp file when dropped.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    /// Reserve a fresh `temp_<millis>_<seq>.tmp` path in `dir`.
    pub fn reserve(dir: &Path) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let seq = TEMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            path: dir.join(format!("temp_{}_{}.tmp", millis, seq)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::trace!(path = %self.path.display(), "Temp file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove temp file");
            }
        }
    }
}

/// A request ready for the executor.
#[derive(Debug)]
pub struct PreparedRequest {
    /// Uppercased method.
    pub method: String,
    pub target: String,
    pub headers: Headers,
    pub body: ResolvedBody,
    /// Keeps the buffered body alive until the request is done.
    pub temp: Option<TempFile>,
}

/// Resolves record bodies using the configured storage directories.
#[derive(Debug, Clone)]
pub struct BodyResolver {
    upload_dir: PathBuf,
    temp_dir: PathBuf,
}

impl BodyResolver {
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            upload_dir: PathBuf::from(&storage.upload_dir),
            temp_dir: PathBuf::from(&storage.temp_dir),
        }
    }

    /// Resolve one record. The record must already be a valid HTTP request.
    pub async fn resolve(&self, record: RequestRecord) -> EngineResult<PreparedRequest> {
        let method = record.method_upper();
        let multipart = record.is_multipart();
        let RequestRecord {
            target,
            mut headers,
            body,
            ..
        } = record;

        let mut temp = None;
        let body = match body {
            BodySource::Stream(stream) if multipart => {
                let decoder =
                    MultipartDecoder::from_content_type(headers.get("Content-Type"), &self.upload_dir)?;
                let form = decoder.decode(stream.into_stream()).await?;
                tracing::debug!(fields = form.len(), "Multipart body decoded");
                ResolvedBody::Form(form)
            }
            BodySource::Stream(stream) => {
                let guard = TempFile::reserve(&self.temp_dir);
                let file = buffer_stream(stream, guard.path()).await?;
                temp = Some(guard);
                ResolvedBody::Stream(file)
            }
            BodySource::FileRef(path) => {
                let path = PathBuf::from(path);
                match tokio::fs::read_to_string(&path).await {
                    Ok(content) => ResolvedBody::Text(content),
                    Err(source) => return Err(EngineError::BodyRead { path, source }),
                }
            }
            BodySource::Inline(text) => ResolvedBody::Text(text),
            BodySource::Empty => ResolvedBody::Empty,
        };

        match body.to_wire() {
            Some(wire) if LENGTH_METHODS.contains(&method.as_str()) => {
                headers.insert("Content-Length", wire.len().to_string());
            }
            Some(_) => {}
            // Streamed bodies are re-framed by the transport.
            None => {
                headers.remove("Content-Length");
            }
        }

        Ok(PreparedRequest {
            method,
            target,
            headers,
            body,
            temp,
        })
    }
}

/// Write the stream to `path`, then reopen it for reading.
async fn buffer_stream(stream: BodyStream, path: &Path) -> EngineResult<File> {
    let to_buffer_error = |source| EngineError::Buffer {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::create(path).await.map_err(to_buffer_error)?;
    let mut segments = stream.into_stream();
    while let Some(segment) = segments.next().await {
        file.write_all(segment.as_bytes())
            .await
            .map_err(to_buffer_error)?;
    }
    file.flush().await.map_err(to_buffer_error)?;
    drop(file);

    tracing::debug!(path = %path.display(), "Stream body buffered");
    File::open(path).await.map_err(to_buffer_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::FormValue;
    use crate::parser::parse_requests;

    fn resolver(dir: &Path) -> BodyResolver {
        BodyResolver::new(&StorageConfig {
            upload_dir: dir.display().to_string(),
            temp_dir: dir.display().to_string(),
        })
    }

    fn single(input: &str) -> RequestRecord {
        let mut records = parse_requests(input);
        assert_eq!(records.len(), 1);
        records.remove(0)
    }

    #[tokio::test]
    async fn test_inline_body_sets_content_length() {
        let dir = tempfile::tempdir().unwrap();
        let record = single("post http://h/x\nContent-Length: 99\n\n{\"é\":1}\n");
        let prepared = resolver(dir.path()).resolve(record).await.unwrap();

        assert_eq!(prepared.method, "POST");
        assert_eq!(prepared.headers.get("Content-Length"), Some("8"));
        assert!(matches!(prepared.body, ResolvedBody::Text(ref t) if t == "{\"é\":1}"));
    }

    #[tokio::test]
    async fn test_get_keeps_headers_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let record = single("GET http://h/x\n\n");
        let prepared = resolver(dir.path()).resolve(record).await.unwrap();
        assert!(!prepared.headers.contains("Content-Length"));
        assert!(matches!(prepared.body, ResolvedBody::Empty));
    }

    #[tokio::test]
    async fn test_file_directive() {
        let dir = tempfile::tempdir().unwrap();
        let payload = dir.path().join("payload.txt");
        std::fs::write(&payload, "from disk\n").unwrap();

        let record = single(&format!("PUT http://h/x\n\n<{}\n", payload.display()));
        let prepared = resolver(dir.path()).resolve(record).await.unwrap();
        assert!(matches!(prepared.body, ResolvedBody::Text(ref t) if t == "from disk\n"));
        assert_eq!(prepared.headers.get("Content-Length"), Some("10"));
    }

    #[tokio::test]
    async fn test_missing_file_directive() {
        let dir = tempfile::tempdir().unwrap();
        let record = single("POST http://h/x\n\n<./does-not-exist.txt\n");
        let err = resolver(dir.path()).resolve(record).await.unwrap_err();
        assert!(matches!(err, EngineError::BodyRead { .. }));
    }

    #[tokio::test]
    async fn test_chunked_stream_buffered_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let record = single(
            "POST http://h/x\nTransfer-Encoding: chunked\nContent-Length: 3\n\n5\nhello\n0\n",
        );
        let prepared = resolver(dir.path()).resolve(record).await.unwrap();

        assert!(prepared.body.is_stream());
        assert!(!prepared.headers.contains("Content-Length"));
        let temp_path = prepared.temp.as_ref().unwrap().path().to_path_buf();
        assert_eq!(std::fs::read_to_string(&temp_path).unwrap(), "hello");

        drop(prepared);
        assert!(!temp_path.exists());
    }

    #[tokio::test]
    async fn test_multipart_body_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let input = "POST http://h/upload\n\
                     Content-Type: multipart/form-data; boundary=XYZ\n\
                     \n\
                     --XYZ\n\
                     Content-Disposition: form-data; name=\"foo\"\n\
                     \n\
                     bar\n\
                     --XYZ--\n";
        let prepared = resolver(dir.path()).resolve(single(input)).await.unwrap();
        match &prepared.body {
            ResolvedBody::Form(form) => {
                assert_eq!(form.get("foo"), Some(&FormValue::Text("bar".into())));
            }
            other => panic!("unexpected body: {:?}", other),
        }
        assert_eq!(prepared.headers.get("Content-Length"), Some("13"));
        assert!(prepared.temp.is_none());
    }

    #[tokio::test]
    async fn test_multipart_without_boundary_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = "POST http://h/upload\nContent-Type: multipart/form-data\n\n--XYZ\n";
        let err = resolver(dir.path()).resolve(single(input)).await.unwrap_err();
        assert!(matches!(err, EngineError::Multipart(_)));
    }

    #[test]
    fn test_temp_names_are_unique() {
        let dir = Path::new(".");
        let a = TempFile::reserve(dir);
        let b = TempFile::reserve(dir);
        assert_ne!(a.path(), b.path());
        let name = a.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("temp_") && name.ends_with(".tmp"));
    }
}
