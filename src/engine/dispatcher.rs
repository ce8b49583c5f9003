//! Sequential dispatch of every record in one buffer.
//!
//! # Responsibilities
//! - Parse the buffer into records
//! - Reject records whose method is not executable
//! - Resolve, execute and render each record in order
//! - Keep failures local to the request that caused them
//!
//! # Design Decisions
//! - Strictly sequential: a request is rendered before the next one is
//!   resolved, so output order matches file order and no two requests touch
//!   the upload/temp namespace at the same time
//! - Errors are logged with method and target and counted; they never
//!   abort the pass

use std::io;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::engine::executor::Executor;
use crate::engine::render;
use crate::engine::resolver::BodyResolver;
use crate::engine::types::{DispatchSummary, EngineResult, Response};
use crate::observability::metrics;
use crate::parser::{parse_requests, RequestRecord};

/// Runs request-file buffers end to end.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    resolver: BodyResolver,
    executor: Executor,
}

impl Dispatcher {
    pub fn new(config: &EngineConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            resolver: BodyResolver::new(&config.storage),
            executor: Executor::new(&config.http)?,
        })
    }

    /// Dispatch a buffer, rendering responses to stdout.
    pub async fn dispatch(&self, content: &str) -> DispatchSummary {
        let mut stdout = io::stdout();
        self.dispatch_to(content, &mut stdout).await
    }

    /// Dispatch a buffer, rendering responses to `out`.
    pub async fn dispatch_to<W: io::Write>(&self, content: &str, out: &mut W) -> DispatchSummary {
        let records = parse_requests(content);
        let mut summary = DispatchSummary::default();

        for record in records {
            if !record.is_http_request() {
                tracing::warn!(method = %record.method, target = %record.target, "Not a valid HTTP request");
                metrics::record_invalid();
                if let Err(e) = writeln!(out, "Not a valid HTTP request: {}", record) {
                    tracing::error!(error = %e, "Failed to write output");
                }
                summary.invalid += 1;
                continue;
            }

            let method = record.method_upper();
            let target = record.target.clone();
            let start = Instant::now();

            match self.run_one(record).await {
                Ok(response) => {
                    metrics::record_request(&method, response.status, start);
                    tracing::info!(
                        method = %method,
                        target = %target,
                        status = response.status,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Request completed"
                    );
                    if let Err(e) = render::write_response(out, &method, &target, &response) {
                        tracing::error!(error = %e, "Failed to write output");
                    }
                    summary.succeeded += 1;
                }
                Err(e) => {
                    tracing::error!(method = %method, target = %target, error = %e, "Request failed");
                    metrics::record_failure(e.kind());
                    summary.failed += 1;
                }
            }
        }

        tracing::debug!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            invalid = summary.invalid,
            "Dispatch finished"
        );
        summary
    }

    async fn run_one(&self, record: RequestRecord) -> EngineResult<Response> {
        let prepared = self.resolver.resolve(record).await?;
        self.executor.execute(prepared).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_records_never_executed() {
        let dispatcher = Dispatcher::new(&EngineConfig::default()).unwrap();
        let mut out = Vec::new();
        let summary = dispatcher
            .dispatch_to("FOO /x HTTP/1.1\n\n", &mut out)
            .await;

        assert_eq!(summary, DispatchSummary { succeeded: 0, failed: 0, invalid: 1 });
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Not a valid HTTP request: FOO /x HTTP/1.1\n"
        );
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let dispatcher = Dispatcher::new(&EngineConfig::default()).unwrap();
        let mut out = Vec::new();
        // Neither request can run: the first has no Host, the second has
        // a missing body file. Both are counted, neither panics.
        let summary = dispatcher
            .dispatch_to("GET /no-host\n\nPOST http://127.0.0.1:9/x\n\n<./missing-file\n", &mut out)
            .await;

        assert_eq!(summary.failed, 2);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_temp_file_removed_when_request_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.storage.temp_dir = dir.path().display().to_string();
        config.storage.upload_dir = dir.path().display().to_string();
        let dispatcher = Dispatcher::new(&config).unwrap();

        let mut out = Vec::new();
        let summary = dispatcher
            .dispatch_to(
                "POST http://127.0.0.1:9/up\nTransfer-Encoding: chunked\n\n5\nhello\n0\n",
                &mut out,
            )
            .await;

        assert_eq!(summary.failed, 1);
        let left: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("temp_"))
            .collect();
        assert!(left.is_empty());
    }

    #[tokio::test]
    async fn test_empty_buffer() {
        let dispatcher = Dispatcher::new(&EngineConfig::default()).unwrap();
        let mut out = Vec::new();
        let summary = dispatcher.dispatch_to("\n\n", &mut out).await;
        assert_eq!(summary.total(), 0);
    }
}
