//! Common utilities shared across connectors.
//!
//! HTTP client creation, URL validation and mapping of HTTP error responses
//! onto crate errors.

use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response};
use std::time::Duration;

/// Connect timeout for all connectors.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Wait suggested on a 429 without a usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Which end of the migration a connector talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Source tracker.
    Source,
    /// Destination tracker.
    Destination,
}

/// Creates an HTTP client with a connect timeout.
///
/// Requests themselves are unbounded unless `request_timeout` is given, so
/// large attachment uploads are never cut short.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn create_http_client(request_timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("tracker-migrate/", env!("CARGO_PKG_VERSION")));
    if let Some(timeout) = request_timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Validates a service base URL.
pub fn validate_url(url: &str) -> Result<()> {
    let has_valid_scheme = ["http://", "https://"].iter().any(|s| url.starts_with(s));

    if !has_valid_scheme {
        return Err(Error::Config(format!(
            "Invalid URL scheme in '{}'. Allowed: http, https",
            url
        )));
    }

    if url.len() < 10 || !url.contains("://") {
        return Err(Error::Config(format!("Invalid URL format: {}", url)));
    }

    Ok(())
}

/// Joins a base URL and an absolute path without doubling slashes.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Seconds to wait according to a `Retry-After` header.
pub fn retry_after_secs(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// Handles HTTP error responses and returns appropriate errors.
pub fn handle_http_error(
    status_code: u16,
    body: &str,
    service: &str,
    side: Side,
    retry_after: u64,
) -> Error {
    match status_code {
        429 => Error::RateLimit(retry_after),
        401 | 403 => Error::Authentication(format!("{} auth failed: {}", service, body)),
        _ => {
            let message = format!("{} error {}: {}", service, status_code, body);
            match side {
                Side::Source => Error::SourceConnection(message),
                Side::Destination => Error::DestinationConnection(message),
            }
        }
    }
}

/// Passes successful responses through and turns the rest into errors.
///
/// # Errors
///
/// Returns the mapped error for any non-2xx status.
pub async fn check_response(response: Response, service: &str, side: Side) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = retry_after_secs(response.headers());
    let body = response.text().await.unwrap_or_default();
    Err(handle_http_error(
        status.as_u16(),
        &body,
        service,
        side,
        retry_after,
    ))
}
