//! Rate-limited fetch primitive.
//!
//! Issues GET requests and retries on HTTP 429 with a linear backoff
//! (`attempt × base_wait`). Every other non-success status fails immediately.

use super::provider::{FetchError, HttpTransport, Sleeper, ThreadSleeper};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP status the remote API uses to signal rate limiting.
pub const RATE_LIMIT_STATUS: u16 = 429;

/// Retry budget and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Wait after the first rate-limited attempt; attempt `n` waits `n × base_wait`.
    pub base_wait: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_wait: Duration) -> Self {
        Self {
            max_attempts,
            base_wait,
        }
    }

    /// Wait after the rate-limited attempt number `attempt` (1-based).
    pub fn wait_for(&self, attempt: u32) -> Duration {
        self.base_wait.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(5))
    }
}

/// Fetch primitive wrapping an [`HttpTransport`] with rate-limit backoff.
pub struct RateLimitedFetcher<T, S = ThreadSleeper> {
    transport: T,
    sleeper: S,
    policy: RetryPolicy,
}

impl<T: HttpTransport> RateLimitedFetcher<T, ThreadSleeper> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self::with_sleeper(transport, ThreadSleeper, policy)
    }
}

impl<T: HttpTransport, S: Sleeper> RateLimitedFetcher<T, S> {
    pub fn with_sleeper(transport: T, sleeper: S, policy: RetryPolicy) -> Self {
        Self {
            transport,
            sleeper,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// GET `url` with `query` and parse the body as JSON.
    ///
    /// Rate-limited responses are retried up to `max_attempts` times, each
    /// followed by a wait that grows with the attempt number. Once the budget
    /// is spent the call fails with [`FetchError::RetriesExhausted`]; it never
    /// returns empty data in place of a response.
    pub fn fetch(&self, url: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            debug!(url, attempt, "GET");
            let resp = self.transport.get(url, query)?;

            if resp.status == RATE_LIMIT_STATUS {
                let wait = self.policy.wait_for(attempt);
                warn!(
                    "rate limited on {url} (attempt {attempt}/{max_attempts}), waiting {}s before retrying",
                    wait.as_secs_f64()
                );
                self.sleeper.sleep(wait);
                continue;
            }

            if !resp.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: resp.status,
                });
            }

            return serde_json::from_str(&resp.body).map_err(|e| FetchError::InvalidJson {
                url: url.to_string(),
                reason: e.to_string(),
            });
        }

        Err(FetchError::RetriesExhausted {
            url: url.to_string(),
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::HttpResponse;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Transport replaying a fixed sequence of responses.
    struct Scripted {
        responses: RefCell<VecDeque<HttpResponse>>,
        calls: RefCell<usize>,
    }

    impl Scripted {
        fn new(responses: Vec<HttpResponse>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                calls: RefCell::new(0),
            }
        }
    }

    impl HttpTransport for Scripted {
        fn get(&self, _url: &str, _query: &[(&str, String)]) -> Result<HttpResponse, FetchError> {
            *self.calls.borrow_mut() += 1;
            Ok(self
                .responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| HttpResponse::new(500, "script exhausted")))
        }
    }

    #[derive(Default)]
    struct Recorder(RefCell<Vec<Duration>>);

    impl Sleeper for Recorder {
        fn sleep(&self, duration: Duration) {
            self.0.borrow_mut().push(duration);
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(5))
    }

    #[test]
    fn success_on_first_attempt_does_not_sleep() {
        let sleeper = Recorder::default();
        let fetcher = RateLimitedFetcher::with_sleeper(
            Scripted::new(vec![HttpResponse::new(200, r#"{"ok":true}"#)]),
            &sleeper,
            policy(),
        );

        let value = fetcher.fetch("http://x/a", &[]).unwrap();

        assert_eq!(value["ok"], true);
        assert!(sleeper.0.borrow().is_empty());
    }

    #[test]
    fn rate_limit_then_success_backs_off_linearly() {
        let sleeper = Recorder::default();
        let fetcher = RateLimitedFetcher::with_sleeper(
            Scripted::new(vec![
                HttpResponse::new(429, ""),
                HttpResponse::new(429, ""),
                HttpResponse::new(200, "[1,2]"),
            ]),
            &sleeper,
            policy(),
        );

        let value = fetcher.fetch("http://x/a", &[]).unwrap();

        assert_eq!(value, serde_json::json!([1, 2]));
        assert_eq!(
            *sleeper.0.borrow(),
            vec![Duration::from_secs(5), Duration::from_secs(10)]
        );
    }

    #[test]
    fn exhausted_budget_reports_url_and_attempts() {
        let sleeper = Recorder::default();
        let transport = Scripted::new(vec![HttpResponse::new(429, ""); 3]);
        let fetcher = RateLimitedFetcher::with_sleeper(transport, &sleeper, policy());

        let err = fetcher.fetch("http://x/markets", &[]).unwrap_err();

        match err {
            FetchError::RetriesExhausted { url, attempts } => {
                assert_eq!(url, "http://x/markets");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(sleeper.0.borrow().len(), 3);
        assert_eq!(*fetcher.transport.calls.borrow(), 3);
    }

    #[test]
    fn other_error_status_fails_without_retry() {
        let sleeper = Recorder::default();
        let fetcher = RateLimitedFetcher::with_sleeper(
            Scripted::new(vec![HttpResponse::new(404, "not found"), HttpResponse::new(200, "{}")]),
            &sleeper,
            policy(),
        );

        let err = fetcher.fetch("http://x/coins/nope", &[]).unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert!(sleeper.0.borrow().is_empty());
        assert_eq!(*fetcher.transport.calls.borrow(), 1);
    }

    #[test]
    fn unparseable_body_is_an_error() {
        let fetcher = RateLimitedFetcher::with_sleeper(
            Scripted::new(vec![HttpResponse::new(200, "<html>")]),
            Recorder::default(),
            policy(),
        );
        assert!(matches!(
            fetcher.fetch("http://x/a", &[]),
            Err(FetchError::InvalidJson { .. })
        ));
    }

    #[test]
    fn wait_grows_with_attempt_number() {
        let p = RetryPolicy::new(10, Duration::from_secs(30));
        assert_eq!(p.wait_for(1), Duration::from_secs(30));
        assert_eq!(p.wait_for(4), Duration::from_secs(120));
    }
}
