//! Outbound HTTP fetches with bounded retry.
//!
//! [`FetchClient`] owns the one `reqwest::Client` of a run together with a
//! [`RetryPolicy`]. Transient failures are
//! retried inside [`FetchClient::fetch`]; everything else is surfaced as a
//! [`FetchError`] whose [`FailureKind`] tells the caller whether a further
//! caller-level retry makes sense.

use std::time::Duration;

use reqwest::{header::RETRY_AFTER, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// HTTP statuses retried at the transport layer.
pub const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Errors returned by [`FetchClient`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request did not complete within the per-request timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The server answered with something other than 200 OK.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Transport-level failure (connection refused, TLS, ...).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The body was not the JSON shape the caller expected.
    #[error("invalid response body from {url}: {detail}")]
    Body { url: String, detail: String },
}

/// Whether a failed fetch is worth another caller-level attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Retryable,
    Fatal,
}

impl FetchError {
    /// Only timeouts are retried by callers.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout { .. } => FailureKind::Retryable,
            Self::Status { .. } | Self::Request(_) | Self::Body { .. } => FailureKind::Fatal,
        }
    }

    /// HTTP status of the failed response, if there was one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Query string of a single request.
///
/// Values are immutable: [`QueryParams::set`] returns a new value, so a page
/// counter can be advanced without touching the parameters other requests
/// were built from. Repeated keys are allowed (the expenses endpoint takes one
/// `ano` pair per year).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    #[must_use]
    pub const fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Append a pair, keeping any existing pairs with the same key.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.pairs.push((key.into(), value.to_string()));
        self
    }

    /// Copy of these parameters with every `key` pair replaced by a single
    /// `key=value` pair at the end.
    #[must_use]
    pub fn set(&self, key: &str, value: impl ToString) -> Self {
        let mut pairs: Vec<(String, String)> = self
            .pairs
            .iter()
            .filter(|(k, _)| k != key)
            .cloned()
            .collect();
        pairs.push((key.to_string(), value.to_string()));
        Self { pairs }
    }

    /// First value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `key`, in insertion order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

/// Transport-level retry settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call, the first one included.
    pub max_attempts: u32,
    /// Base of the exponential backoff.
    pub backoff_factor: Duration,
    /// Upper bound for any single sleep, `Retry-After` included.
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_factor: Duration::from_secs(1),
            backoff_max: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn is_retryable_status(status: StatusCode) -> bool {
        RETRY_STATUSES.contains(&status.as_u16())
    }

    /// Sleep before the `retry`-th retry (1-based): `factor * 2^(retry - 1)`,
    /// capped at `backoff_max`.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.backoff_factor
            .saturating_mul(1_u32 << exponent)
            .min(self.backoff_max)
    }
}

/// Retry-aware JSON fetcher shared by every request of a run.
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl FetchClient {
    /// Build a client whose requests time out after `timeout`.
    ///
    /// # Errors
    /// Returns an error if the underlying `reqwest::Client` cannot be built.
    pub fn new(timeout: Duration, policy: RetryPolicy) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, policy })
    }

    /// Wrap an existing `reqwest::Client` (custom timeouts, proxies, tests).
    #[must_use]
    pub const fn with_client(client: reqwest::Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GET `url` with `params` and parse the 200 body as JSON.
    ///
    /// Timeouts, connection failures and [`RETRY_STATUSES`] are retried up to
    /// `policy.max_attempts` times with exponential backoff. A `Retry-After`
    /// header (in seconds) on 429/503 replaces the computed delay.
    ///
    /// # Errors
    /// - [`FetchError::Status`] for a non-200 status that is not retryable, or
    ///   the last retryable status once attempts run out.
    /// - [`FetchError::Timeout`] when the last attempt timed out.
    /// - [`FetchError::Request`] for other transport failures.
    /// - [`FetchError::Body`] when a 200 body is not JSON.
    pub async fn fetch(&self, url: &str, params: &QueryParams) -> Result<Value, FetchError> {
        let mut attempt = 1;
        loop {
            let (error, retry_after) = match self.client.get(url).query(params.pairs()).send().await
            {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::OK {
                        return response.json::<Value>().await.map_err(|e| {
                            if e.is_timeout() {
                                FetchError::Timeout { url: url.to_string() }
                            } else {
                                FetchError::Body {
                                    url: url.to_string(),
                                    detail: e.to_string(),
                                }
                            }
                        });
                    }
                    if !RetryPolicy::is_retryable_status(status) {
                        return Err(FetchError::Status {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }
                    let retry_after = retry_after(&response);
                    (
                        FetchError::Status {
                            status: status.as_u16(),
                            url: url.to_string(),
                        },
                        retry_after,
                    )
                }
                Err(e) if e.is_timeout() => (FetchError::Timeout { url: url.to_string() }, None),
                Err(e) if e.is_connect() => (FetchError::Request(e), None),
                Err(e) => return Err(FetchError::Request(e)),
            };

            if attempt >= self.policy.max_attempts {
                return Err(error);
            }

            let delay = retry_after.map_or_else(
                || self.policy.backoff(attempt),
                |requested| requested.min(self.policy.backoff_max),
            );
            warn!(
                url,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "transient failure, retrying request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// [`fetch`](Self::fetch), re-issued up to `timeout_retries` more times
    /// while the failure is [`FailureKind::Retryable`].
    ///
    /// Runs on top of the transport retries.
    ///
    /// # Errors
    /// Returns the last [`FetchError`] once it is fatal or the retries are
    /// spent.
    pub async fn fetch_with_timeout_retries(
        &self,
        url: &str,
        params: &QueryParams,
        timeout_retries: u32,
    ) -> Result<Value, FetchError> {
        let mut remaining = timeout_retries;
        loop {
            match self.fetch(url, params).await {
                Err(error) if error.kind() == FailureKind::Retryable && remaining > 0 => {
                    remaining -= 1;
                    warn!(url, remaining, error = %error, "request timed out, trying again");
                }
                result => return result,
            }
        }
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    if !matches!(
        response.status(),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    ) {
        return None;
    }
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_allows_five_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff_factor, Duration::from_secs(1));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            backoff_factor: Duration::from_secs(1),
            backoff_max: Duration::from_secs(10),
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(4), Duration::from_secs(8));
        assert_eq!(policy.backoff(5), Duration::from_secs(10));
        assert_eq!(policy.backoff(64), Duration::from_secs(10));
    }

    #[test]
    fn retryable_statuses() {
        let cases = [
            (429, true),
            (500, true),
            (502, true),
            (503, true),
            (504, true),
            (400, false),
            (401, false),
            (404, false),
            (501, false),
        ];

        for (code, expected) in cases {
            let status = StatusCode::from_u16(code).expect("valid status");
            assert_eq!(
                RetryPolicy::is_retryable_status(status),
                expected,
                "status {code}"
            );
        }
    }

    #[test]
    fn only_timeouts_are_retryable_by_callers() {
        let timeout = FetchError::Timeout { url: "u".into() };
        let status = FetchError::Status {
            status: 404,
            url: "u".into(),
        };
        let body = FetchError::Body {
            url: "u".into(),
            detail: "d".into(),
        };
        assert_eq!(timeout.kind(), FailureKind::Retryable);
        assert_eq!(status.kind(), FailureKind::Fatal);
        assert_eq!(body.kind(), FailureKind::Fatal);
        assert_eq!(status.status(), Some(404));
        assert_eq!(timeout.status(), None);
    }

    #[test]
    fn set_returns_new_value_and_leaves_original_untouched() {
        let base = QueryParams::new().with("itens", 100).with("pagina", 1);
        let next = base.set("pagina", 2);

        assert_eq!(base.get("pagina"), Some("1"));
        assert_eq!(next.get("pagina"), Some("2"));
        assert_eq!(next.get("itens"), Some("100"));
        assert_eq!(next.pairs().len(), 2);
    }

    #[test]
    fn repeated_keys_are_kept() {
        let params = QueryParams::new().with("ano", 2023).with("ano", 2024);
        let years: Vec<&str> = params.get_all("ano").collect();
        assert_eq!(years, ["2023", "2024"]);
        assert_eq!(params.get("ano"), Some("2023"));
    }
}
