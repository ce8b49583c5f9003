//! Watch mode: re-dispatch a request file whenever it settles.
//!
//! # Data Flow
//! ```text
//! notify event (watcher.rs)
//!     → debounce (quiet for debounce_ms)
//!     → read file
//!     → stability filter (wait marker, minimum length)
//!     → Dispatcher::dispatch
//! ```
//!
//! # Design Decisions
//! - Only `.http` and `.rest` files are accepted
//! - The wait marker is written at the top of the file on start; the first
//!   dispatch happens once the user deletes it
//! - A pass that is already dispatching finishes before shutdown is honored

pub mod watcher;

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::config::WatchConfig;
use crate::engine::Dispatcher;
use crate::lifecycle::Shutdown;
use crate::watch::watcher::FileWatcher;

/// File extensions treated as request files.
pub const REQUEST_FILE_EXTENSIONS: &[&str] = &["http", "rest"];

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("{0} is not a request file (expected .http or .rest)")]
    UnsupportedFile(PathBuf),

    #[error("failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("watch failed: {0}")]
    Notify(#[from] notify::Error),
}

/// True when `path` has a request-file extension.
pub fn is_request_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            REQUEST_FILE_EXTENSIONS
                .iter()
                .any(|known| e.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// True when `content` looks finished enough to dispatch.
pub fn is_stable(content: &str, config: &WatchConfig) -> bool {
    if content.chars().count() < config.min_content_len {
        return false;
    }
    config.wait_marker.is_empty() || !content.contains(&config.wait_marker)
}

/// Watch `path` until `shutdown` is triggered.
pub async fn watch_file(
    path: &Path,
    config: &WatchConfig,
    dispatcher: &Dispatcher,
    shutdown: &Shutdown,
) -> Result<(), WatchError> {
    if !is_request_file(path) {
        return Err(WatchError::UnsupportedFile(path.to_path_buf()));
    }

    prepend_wait_marker(path, &config.wait_marker).await?;

    let (watcher, mut changes) =
        FileWatcher::new(path, Duration::from_millis(config.poll_interval_ms));
    let _handle = watcher.run()?;
    let mut shutdown_rx = shutdown.subscribe();
    let debounce = Duration::from_millis(config.debounce_ms);

    while !shutdown.is_triggered() {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            change = changes.recv() => {
                if change.is_none() {
                    break;
                }
            }
        }

        // Wait for a quiet period; every new change restarts it.
        loop {
            tokio::select! {
                _ = tokio::time::sleep(debounce) => break,
                change = changes.recv() => {
                    if change.is_none() {
                        break;
                    }
                }
            }
        }

        if shutdown.is_triggered() {
            break;
        }

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Failed to read watched file");
                continue;
            }
        };

        if !is_stable(&content, config) {
            tracing::debug!(path = ?path, "Content not ready, skipping");
            continue;
        }

        let summary = dispatcher.dispatch(&content).await;
        tracing::info!(
            path = ?path,
            succeeded = summary.succeeded,
            failed = summary.failed,
            invalid = summary.invalid,
            "Pass complete"
        );
    }

    tracing::info!(path = ?path, "Watch stopped");
    Ok(())
}

/// Create the file if needed and put the wait marker at its start.
///
/// Nothing is dispatched until the user removes the marker.
async fn prepend_wait_marker(path: &Path, marker: &str) -> Result<(), WatchError> {
    let io_error = |source| WatchError::Io {
        path: path.to_path_buf(),
        source,
    };

    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = ?path, "Creating request file");
            String::new()
        }
        Err(e) => return Err(io_error(e)),
    };

    if marker.is_empty() || content.contains(marker) {
        return Ok(());
    }
    tokio::fs::write(path, format!("{} {}", marker, content))
        .await
        .map_err(io_error)
}
