//! Field sinks for the multipart decoder.
//!
//! A sink receives one field's content. Text fields stay in memory; file
//! fields are streamed to an upload file. `close` consumes the sink, so a
//! sink is flushed and closed exactly once.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::multipart::{FormField, FormValue, MultipartError};

#[derive(Debug)]
pub enum Sink {
    Memory {
        field: String,
        buf: String,
    },
    File {
        field: String,
        filename: String,
        path: PathBuf,
        file: File,
    },
}

impl Sink {
    pub fn memory(field: impl Into<String>) -> Self {
        Sink::Memory {
            field: field.into(),
            buf: String::new(),
        }
    }

    /// Create the upload file for a file-valued field.
    pub async fn file(field: &str, filename: &str, dir: &Path) -> Result<Self, MultipartError> {
        let path = dir.join(upload_file_name(field, filename));
        let file = File::create(&path).await.map_err(|source| MultipartError::Sink {
            field: field.to_string(),
            source,
        })?;
        tracing::debug!(field = %field, path = %path.display(), "Opened upload sink");

        Ok(Sink::File {
            field: field.to_string(),
            filename: filename.to_string(),
            path,
            file,
        })
    }

    pub fn field(&self) -> &str {
        match self {
            Sink::Memory { field, .. } | Sink::File { field, .. } => field,
        }
    }

    pub async fn write(&mut self, data: &str) -> Result<(), MultipartError> {
        match self {
            Sink::Memory { buf, .. } => {
                buf.push_str(data);
                Ok(())
            }
            Sink::File { field, file, .. } => {
                file.write_all(data.as_bytes())
                    .await
                    .map_err(|source| MultipartError::Sink {
                        field: field.clone(),
                        source,
                    })
            }
        }
    }

    /// Flush and close the sink, producing the field it collected.
    pub async fn close(self) -> Result<FormField, MultipartError> {
        match self {
            Sink::Memory { field, buf } => Ok(FormField {
                name: field,
                value: FormValue::Text(buf),
            }),
            Sink::File {
                field,
                filename,
                path,
                mut file,
            } => {
                let closed = async {
                    file.flush().await?;
                    file.shutdown().await
                }
                .await;
                if let Err(source) = closed {
                    return Err(MultipartError::Sink { field, source });
                }
                Ok(FormField {
                    name: field,
                    value: FormValue::File {
                        filename,
                        storage_path: path,
                    },
                })
            }
        }
    }
}

/// `upload_<field>_<filename>`, reduced to a single path component.
pub fn upload_file_name(field: &str, filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("file_{}", unix_millis()));

    let field: String = field
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();

    format!("upload_{}_{}", field, base)
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
