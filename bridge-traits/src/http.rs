//! HTTP Client Abstraction
//!
//! Network access for remote audio sources. Requests carry the per-source
//! headers configured on an asset so hosts can authenticate media downloads.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

/// Dynamic async reader returned by streaming downloads.
pub type DynAsyncRead = dyn tokio::io::AsyncRead + Send + Unpin;

/// HTTP `GET` request for a media download
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Merge a set of headers into the request, overriding duplicates.
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in headers {
            self.headers.insert(key.into(), value.into());
        }
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub use_exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            use_exponential_backoff: true,
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to wait before the given retry (1-based attempt that just failed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.use_exponential_backoff {
            return self.base_delay;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Async HTTP client trait
///
/// Implementations should handle:
/// - TLS certificate validation
/// - Connection pooling and keep-alive
///
/// Retries are driven by the caller through [`RetryPolicy`]; implementations
/// report non-success statuses as [`BridgeError::HttpStatus`](crate::BridgeError::HttpStatus) so transient
/// failures can be told apart.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest};
///
/// async fn open(client: &dyn HttpClient) -> Result<Box<DynAsyncRead>> {
///     let request = HttpRequest::get("https://cdn.example.com/song.mp3")
///         .header("Authorization", "Bearer abc");
///     client.download_stream(request).await
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Download a response body as a stream of bytes.
    ///
    /// Used by the remote audio cache so large files are never held in memory.
    /// Request headers must be forwarded unchanged.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::HttpStatus`](crate::BridgeError::HttpStatus) for a non-2xx response
    /// - [`BridgeError::OperationFailed`](crate::BridgeError::OperationFailed) if the connection fails or times out
    async fn download_stream(&self, request: HttpRequest) -> Result<Box<DynAsyncRead>>;
}
