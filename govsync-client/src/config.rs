use std::{fmt, time::Duration};

use reqwest::StatusCode;

/// Connection settings supplied by the caller.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the tenant API, e.g. `https://acme.api.identitynow.com`.
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub retry: RetryPolicy,
    /// A token is refreshed this long before it actually expires.
    pub token_safety_margin: Duration,
    /// Timeout of a single HTTP attempt.
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub const DEFAULT_TOKEN_SAFETY_MARGIN: Duration = Duration::from_secs(300);
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(base_url: &str, client_id: &str, client_secret: &str) -> Self {
        ClientConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            retry: RetryPolicy::default(),
            token_safety_margin: Self::DEFAULT_TOKEN_SAFETY_MARGIN,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_token_safety_margin(mut self, margin: Duration) -> Self {
        self.token_safety_margin = margin;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn token_url(&self) -> String {
        self.url("oauth/token")
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("retry", &self.retry)
            .field("token_safety_margin", &self.token_safety_margin)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// When and how long to wait before repeating a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        RetryPolicy {
            max_retries: 0,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// The wait before retry number `retry` (zero-based): doubling from
    /// `initial_backoff`, or the server's `Retry-After`, never more than
    /// `max_backoff`.
    pub fn backoff(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let exponential = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(retry));
        retry_after.unwrap_or(exponential).min(self.max_backoff)
    }

    /// 5xx, 429 and 408 are transient. Every other failure status is the
    /// caller's problem.
    pub fn is_retryable_status(status: StatusCode) -> bool {
        status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
    }
}

/// Parse a `Retry-After` header in its delay-seconds form.
///
/// The HTTP-date form is not supported and yields `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
