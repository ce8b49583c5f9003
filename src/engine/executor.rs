//! Request execution over the network.
//!
//! # Responsibilities
//! - Build the absolute URL from the record target (and `Host` header)
//! - Translate record headers into transport headers
//! - Send buffered bodies in one piece, pipe streamed bodies from disk
//! - Collect status, headers in receipt order, and the body
//!
//! # Design Decisions
//! - HTTP/1.1 only, no idle connection reuse between requests
//! - Redirects are never followed; a 3xx is rendered like any response
//! - Image responses are drained but never decoded to text
//! - Response headers keep the transport's order; repeated names are
//!   grouped under their first occurrence

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::{Client, Method};
use url::Url;

use crate::config::HttpConfig;
use crate::engine::resolver::PreparedRequest;
use crate::engine::types::{EngineError, EngineResult, ResolvedBody, Response, ResponseBody};
use crate::parser::record::Headers;

/// Issues prepared requests with a shared client.
#[derive(Debug, Clone)]
pub struct Executor {
    client: Client,
}

impl Executor {
    /// Build the HTTP client from configuration.
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            // Redirects are rendered, not followed.
            .redirect(Policy::none())
            .http1_only()
            .pool_max_idle_per_host(0);
        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Send one request and read the full response.
    ///
    /// Any temp file backing the body lives until this returns.
    pub async fn execute(&self, request: PreparedRequest) -> EngineResult<Response> {
        let PreparedRequest {
            method,
            target,
            headers,
            body,
            temp: _temp,
        } = request;

        let url = resolve_url(&target, &headers)?;
        let http_method = to_method(&method);

        let mut builder = self
            .client
            .request(http_method, url)
            .headers(to_header_map(&headers));

        builder = match body {
            ResolvedBody::Empty => builder,
            ResolvedBody::Stream(file) => builder.body(reqwest::Body::from(file)),
            buffered => match buffered.to_wire() {
                Some(wire) => builder.body(wire),
                None => builder,
            },
        };

        tracing::debug!(method = %method, target = %target, "Sending request");

        let transport_error = |source| EngineError::Transport {
            method: method.clone(),
            target: target.clone(),
            source,
        };

        let response = builder.send().await.map_err(transport_error)?;

        let protocol = format!("{:?}", response.version());
        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let content_type = headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.clone());

        let body = match content_type {
            Some(ct) if ct.starts_with("image") => {
                let bytes = response.bytes().await.map_err(transport_error)?;
                ResponseBody::Binary {
                    content_type: ct,
                    length: bytes.len(),
                }
            }
            _ => ResponseBody::Text(response.text().await.map_err(transport_error)?),
        };

        Ok(Response {
            protocol,
            status,
            headers,
            body,
        })
    }
}

/// Turn a record target into an absolute http(s) URL.
///
/// Absolute targets are used as-is. Origin-form targets (`/path`) are
/// joined with the record's `Host` header over plain http.
pub fn resolve_url(target: &str, headers: &Headers) -> EngineResult<Url> {
    let invalid = |reason: &str| EngineError::InvalidTarget {
        target: target.to_string(),
        reason: reason.to_string(),
    };

    if target.is_empty() {
        return Err(invalid("missing target"));
    }

    match Url::parse(target) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
        Ok(url) => Err(invalid(&format!("unsupported scheme '{}'", url.scheme()))),
        Err(_) if target.starts_with('/') => {
            let host = headers
                .get("Host")
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .ok_or_else(|| invalid("relative target without Host header"))?;
            Url::parse(&format!("http://{}{}", host, target)).map_err(|e| invalid(&e.to_string()))
        }
        Err(e) => Err(invalid(&e.to_string())),
    }
}

/// Map an uppercase method from [`KNOWN_METHODS`](crate::parser::record::KNOWN_METHODS) to the transport type.
///
/// The dispatcher rejects every other method before execution.
fn to_method(method: &str) -> Method {
    match method {
        "POST" => Method::POST,
        "PUT" => Method::PUT,
        "DELETE" => Method::DELETE,
        "PATCH" => Method::PATCH,
        "OPTIONS" => Method::OPTIONS,
        "HEAD" => Method::HEAD,
        _ => Method::GET,
    }
}

fn to_header_map(headers: &Headers) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping header that cannot be sent"),
        }
    }
    map
}
