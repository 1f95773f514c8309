//! Convergence: repeat a status check until the remote state matches.
//!
//! AEM acknowledges uploads, installs and builds before they take effect.
//! [`converge`] re-runs a check with capped exponential backoff until it
//! reports the expected boolean, or gives up with the last check's message.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AemError, Result};
use crate::obs;
use crate::params::leading_int;
use crate::result::AemResult;

pub const DEFAULT_MAX_TRIES: u32 = 30;
pub const DEFAULT_BASE_SLEEP_SECS: u64 = 2;
pub const DEFAULT_MAX_SLEEP_SECS: u64 = 2;

/// Retry bounds for one convergence loop.
///
/// Invariants: `max_tries >= 1`, `max_sleep >= base_sleep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_tries: u32,
    base_sleep: Duration,
    max_sleep: Duration,
}

impl Default for RetryPolicy {
    /// 30 tries, 2s base, 2s max: a fixed 2-second interval.
    fn default() -> Self {
        RetryPolicy::new(
            DEFAULT_MAX_TRIES,
            Duration::from_secs(DEFAULT_BASE_SLEEP_SECS),
            Duration::from_secs(DEFAULT_MAX_SLEEP_SECS),
        )
    }
}

impl RetryPolicy {
    pub fn new(max_tries: u32, base_sleep: Duration, max_sleep: Duration) -> Self {
        RetryPolicy {
            max_tries: max_tries.max(1),
            base_sleep,
            max_sleep: max_sleep.max(base_sleep),
        }
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    pub fn base_sleep(&self) -> Duration {
        self.base_sleep
    }

    pub fn max_sleep(&self) -> Duration {
        self.max_sleep
    }

    /// Sleep after the given failed attempt (1-based): doubles from
    /// `base_sleep`, capped at `max_sleep`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_sleep.saturating_mul(factor).min(self.max_sleep)
    }
}

/// A numeric option as it arrives from untyped callers: an integer, a float
/// or numeric text such as `"5"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LenientInt {
    Int(i64),
    Float(f64),
    Text(String),
}

impl LenientInt {
    /// Integer value; text uses its leading digits, floats truncate.
    pub fn coerce(&self) -> i64 {
        match self {
            LenientInt::Int(n) => *n,
            LenientInt::Float(f) => *f as i64,
            LenientInt::Text(s) => leading_int(s),
        }
    }
}

impl From<i64> for LenientInt {
    fn from(n: i64) -> Self {
        LenientInt::Int(n)
    }
}

impl From<i32> for LenientInt {
    fn from(n: i32) -> Self {
        LenientInt::Int(i64::from(n))
    }
}

impl From<&str> for LenientInt {
    fn from(s: &str) -> Self {
        LenientInt::Text(s.to_string())
    }
}

/// Caller-supplied, possibly partial retry settings. Missing fields take
/// the defaults (30 tries, 2s base, 2s max).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryOptions {
    #[serde(default)]
    pub max_tries: Option<LenientInt>,
    #[serde(default)]
    pub base_sleep_seconds: Option<LenientInt>,
    #[serde(default)]
    pub max_sleep_seconds: Option<LenientInt>,
}

impl RetryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_tries(mut self, value: impl Into<LenientInt>) -> Self {
        self.max_tries = Some(value.into());
        self
    }

    pub fn base_sleep_seconds(mut self, value: impl Into<LenientInt>) -> Self {
        self.base_sleep_seconds = Some(value.into());
        self
    }

    pub fn max_sleep_seconds(mut self, value: impl Into<LenientInt>) -> Self {
        self.max_sleep_seconds = Some(value.into());
        self
    }

    /// Merge over the defaults and coerce to a valid policy.
    pub fn policy(&self) -> RetryPolicy {
        let pick = |value: &Option<LenientInt>, default: i64| {
            value.as_ref().map(LenientInt::coerce).unwrap_or(default)
        };
        let max_tries = pick(&self.max_tries, i64::from(DEFAULT_MAX_TRIES));
        let base = pick(&self.base_sleep_seconds, DEFAULT_BASE_SLEEP_SECS as i64);
        let max = pick(&self.max_sleep_seconds, DEFAULT_MAX_SLEEP_SECS as i64);

        RetryPolicy::new(
            u32::try_from(max_tries.max(1)).unwrap_or(u32::MAX),
            Duration::from_secs(base.max(0) as u64),
            Duration::from_secs(max.max(0) as u64),
        )
    }
}

impl From<RetryOptions> for RetryPolicy {
    fn from(options: RetryOptions) -> Self {
        options.policy()
    }
}

/// Progress of one convergence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptEvent {
    pub label: String,
    /// 1-based attempt number
    pub attempt: u32,
    pub max_tries: u32,
    /// Whether this attempt observed the expected state
    pub ready: bool,
    pub message: String,
}

/// Receives one event per convergence attempt.
pub trait ConvergenceObserver: Send + Sync {
    fn on_attempt(&self, event: &AttemptEvent);
}

/// Default observer: logs each attempt as a `convergence.attempt` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ConvergenceObserver for TracingObserver {
    fn on_attempt(&self, event: &AttemptEvent) {
        obs::emit_convergence_attempt(&event.label, event.attempt, event.ready, &event.message);
    }
}

/// Run `check` until it succeeds with `Bool(expected)` data.
///
/// Returns the first satisfying check result. After `max_tries` unsatisfied
/// attempts, fails with [`AemError::ConvergenceExhausted`] carrying the last
/// result. Errors from `check` itself (transport failures) are returned at
/// once and never retried.
pub async fn converge<F, Fut>(
    policy: &RetryPolicy,
    observer: &dyn ConvergenceObserver,
    label: &str,
    expected: bool,
    mut check: F,
) -> Result<AemResult>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<AemResult>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = check().await?;
        let ready = result.is_success() && result.data().as_bool() == Some(expected);

        observer.on_attempt(&AttemptEvent {
            label: label.to_string(),
            attempt,
            max_tries: policy.max_tries,
            ready,
            message: result.message().to_string(),
        });

        if ready {
            return Ok(result);
        }
        if attempt >= policy.max_tries {
            obs::emit_convergence_exhausted(label, attempt, result.message());
            return Err(AemError::ConvergenceExhausted {
                attempts: attempt,
                result: Box::new(result),
            });
        }
        tokio::time::sleep(policy.delay(attempt)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::RecordingObserver;
    use crate::result::ResultData;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_tries(), 30);
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(10), Duration::from_secs(2));
    }

    #[test]
    fn test_delay_doubles_up_to_cap() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5));
        let delays: Vec<u64> = (1..=5).map(|a| policy.delay(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
        assert_eq!(policy.delay(40), Duration::from_secs(5));
    }

    #[test]
    fn test_policy_invariants_clamped() {
        let policy = RetryPolicy::new(0, Duration::from_secs(3), Duration::from_secs(1));
        assert_eq!(policy.max_tries(), 1);
        assert_eq!(policy.max_sleep(), Duration::from_secs(3));
    }

    #[test]
    fn test_options_text_equals_integer() {
        let text = RetryOptions::new().max_tries("5").policy();
        let int = RetryOptions::new().max_tries(5).policy();
        assert_eq!(text, int);
        assert_eq!(text.max_tries(), 5);
        assert_eq!(text.base_sleep(), Duration::from_secs(2));
    }

    #[test]
    fn test_options_from_untyped_json() {
        let options: RetryOptions = serde_json::from_str(
            r#"{"max_tries": "7", "base_sleep_seconds": 1, "max_sleep_seconds": "4"}"#,
        )
        .unwrap();
        let policy = options.policy();
        assert_eq!(policy.max_tries(), 7);
        assert_eq!(policy.base_sleep(), Duration::from_secs(1));
        assert_eq!(policy.max_sleep(), Duration::from_secs(4));

        let partial: RetryOptions = serde_json::from_str(r#"{"max_tries": 3}"#).unwrap();
        assert_eq!(partial.policy().max_sleep(), Duration::from_secs(2));
    }

    #[test]
    fn test_options_garbage_coerces_to_bounds() {
        let policy = RetryOptions::new()
            .max_tries("lots")
            .base_sleep_seconds(-4)
            .policy();
        assert_eq!(policy.max_tries(), 1);
        assert_eq!(policy.base_sleep(), Duration::ZERO);
    }

    fn flag(ready: bool, n: u32) -> AemResult {
        AemResult::new(format!("check {}", n)).with_data(ResultData::Bool(ready))
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_on_nth_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_secs(2), Duration::from_secs(2));
        let observer = RecordingObserver::new();
        let calls = Arc::new(AtomicU32::new(0));

        let result = converge(&policy, &observer, "Build", true, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(flag(n == 3, n)) }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.message(), "check 3");
        let events = observer.events();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events.iter().map(|e| e.ready).collect::<Vec<_>>(),
            vec![false, false, true]
        );
        assert_eq!(events[0].attempt, 1);
        assert_eq!(events[0].label, "Build");
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_carries_last_message() {
        let policy = RetryPolicy::new(4, Duration::from_secs(1), Duration::from_secs(8));
        let calls = Arc::new(AtomicU32::new(0));

        let started = tokio::time::Instant::now();
        let err = converge(&policy, &TracingObserver, "Install", true, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(flag(false, n)) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(err.to_string(), "check 4");
        assert!(matches!(err, AemError::ConvergenceExhausted { attempts: 4, .. }));
        // 1 + 2 + 4 seconds of backoff between four attempts
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expected_false() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));

        converge(&policy, &TracingObserver, "Delete", false, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(flag(n < 2, n)) }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_check_never_counts_as_ready() {
        let policy = RetryPolicy::new(2, Duration::ZERO, Duration::ZERO);
        let err = converge(&policy, &TracingObserver, "Delete", false, || async {
            Ok(AemResult::failure("listing failed").with_data(ResultData::Bool(false)))
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "listing failed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_error_is_not_retried() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));

        let err = converge(&policy, &TracingObserver, "Upload", true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AemError::Transport(crate::error::TransportError::Http(
                    "connection refused".to_string(),
                )))
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, AemError::Transport(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
