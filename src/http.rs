//! HTTP transport and retry handling
//!
//! This module defines the narrow GET contract the rest of the crate relies
//! on, a blocking `reqwest` implementation of it, and the response
//! classification shared by every fetcher: 404 and 403 are terminal
//! signals, 5xx responses are retried with exponential backoff and any other
//! non-2xx status is an error.

use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Browser-like user agent; rtve.es serves reduced listings to unknown clients
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36";

/// Errors that can occur while fetching a URL
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// The server answered 404; terminal for pagination
    #[error("Not found: {url}")]
    NotFound { url: String },

    /// The server answered 403; terminal for pagination
    #[error("Access forbidden: {url}")]
    Forbidden { url: String },

    /// The server kept answering 5xx until the retry ceiling was reached
    #[error("Server error {status} from {url} after {attempts} attempt(s)")]
    ServerError {
        url: String,
        status: u16,
        attempts: u32,
    },

    /// Any other non-success status
    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    /// The request could not be sent or the body could not be read
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
}

impl HttpError {
    /// Returns true for the 404/403 signals that end pagination gracefully
    pub fn is_terminal(&self) -> bool {
        matches!(self, HttpError::NotFound { .. } | HttpError::Forbidden { .. })
    }
}

/// A single GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest<'a> {
    /// Absolute URL to fetch
    pub url: &'a str,
    /// Value of the `Accept` header
    pub accept: &'a str,
    /// Per-request timeout
    pub timeout: Duration,
}

/// Raw response as seen by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Vec<u8>,
}

/// Trait for blocking HTTP transports.
///
/// Implementors perform exactly one GET and report the status code without
/// interpreting it. Status classification and retries live in
/// [`get_with_retry`].
pub trait Transport {
    /// Performs a GET request
    ///
    /// # Errors
    ///
    /// Returns `HttpError::Request` when the request cannot be completed at
    /// the transport level (DNS, TLS, timeout, truncated body).
    fn get(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, HttpError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, HttpError> {
        (**self).get(request)
    }
}

/// Transport backed by a blocking `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Creates a transport sending the given user agent with every request
    pub fn new(user_agent: &str) -> Result<Self, HttpError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| HttpError::Request {
                url: String::new(),
                message: e.to_string(),
            })?;

        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, HttpError> {
        let to_error = |e: reqwest::Error| HttpError::Request {
            url: request.url.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(request.url)
            .header(reqwest::header::ACCEPT, request.accept)
            .timeout(request.timeout)
            .send()
            .map_err(to_error)?;

        let status = response.status().as_u16();
        let body = response.bytes().map_err(to_error)?.to_vec();

        Ok(HttpResponse { status, body })
    }
}

/// Retry settings for 5xx responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every further retry
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Delay to wait after the given zero-based failed attempt
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

/// Performs a GET, retrying server errors with exponential backoff
///
/// # Returns
///
/// The response body of the first 2xx response.
///
/// # Errors
///
/// - `NotFound` / `Forbidden` for 404 / 403, without retrying
/// - `ServerError` once `policy.max_retries` retries all answered 5xx
/// - `UnexpectedStatus` for any other non-2xx status
/// - `Request` for transport failures, without retrying
pub fn get_with_retry<T: Transport + ?Sized>(
    transport: &T,
    request: &HttpRequest<'_>,
    policy: &RetryPolicy,
) -> Result<Vec<u8>, HttpError> {
    let mut attempt = 0;

    loop {
        let response = transport.get(request)?;

        match response.status {
            200..=299 => return Ok(response.body),
            404 => {
                return Err(HttpError::NotFound {
                    url: request.url.to_string(),
                });
            }
            403 => {
                return Err(HttpError::Forbidden {
                    url: request.url.to_string(),
                });
            }
            status @ 500..=599 => {
                if attempt >= policy.max_retries {
                    return Err(HttpError::ServerError {
                        url: request.url.to_string(),
                        status,
                        attempts: attempt + 1,
                    });
                }

                let delay = policy.backoff(attempt);
                tracing::debug!(
                    url = request.url,
                    status,
                    retry = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "server error, retrying"
                );
                thread::sleep(delay);
                attempt += 1;
            }
            status => {
                return Err(HttpError::UnexpectedStatus {
                    url: request.url.to_string(),
                    status,
                });
            }
        }
    }
}
