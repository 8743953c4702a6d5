//! Retry and circuit breaking around an unreliable backend
//!
//! Each call is retried with exponential backoff; rate-limit errors wait
//! longer. Consecutive failed attempts are counted across calls, and once the
//! count reaches the threshold the breaker opens: calls are refused without
//! contacting the backend until the cooldown passes. The first call after the
//! cooldown is let through; a success closes the breaker and resets the
//! count, a failure re-opens it.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use super::types::ClassificationRequest;
use super::ClassificationBackend;

/// Backoff settings
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub rate_limit_delay: Duration,
    pub rate_limit_max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            rate_limit_delay: Duration::from_secs(10),
            rate_limit_max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32, kind: FailureKind) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        match kind {
            FailureKind::RateLimit => self
                .rate_limit_delay
                .saturating_mul(factor)
                .min(self.rate_limit_max_delay),
            _ => self.base_delay.saturating_mul(factor).min(self.max_delay),
        }
    }
}

/// Failure classes, read from error text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimit,
    Timeout,
    Unavailable,
    Other,
}

impl FailureKind {
    pub fn classify(message: &str) -> Self {
        let m = message.to_lowercase();
        if m.contains("429")
            || m.contains("rate limit")
            || m.contains("too many requests")
            || m.contains("quota")
            || m.contains("resource_exhausted")
        {
            Self::RateLimit
        } else if m.contains("timeout")
            || m.contains("timed out")
            || m.contains("deadline")
            || m.contains("connection")
            || m.contains("network")
        {
            Self::Timeout
        } else if m.contains("503")
            || m.contains("502")
            || m.contains("500")
            || m.contains("unavailable")
            || m.contains("overloaded")
        {
            Self::Unavailable
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Timeout => "timeout",
            Self::Unavailable => "unavailable",
            Self::Other => "other",
        }
    }
}

/// Breaker settings
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 10,
            cooldown: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Observable breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerStatus {
    Closed,
    /// Refusing calls for the remaining duration
    Open(Duration),
    /// Cooldown over; the next call is a probe
    HalfOpen,
}

/// Shared failure counter and cooldown clock
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn status(&self) -> BreakerStatus {
        let state = self.state();
        match state.opened_at {
            None => BreakerStatus::Closed,
            Some(opened) => {
                let elapsed = opened.elapsed();
                if elapsed < self.config.cooldown {
                    BreakerStatus::Open(self.config.cooldown - elapsed)
                } else {
                    BreakerStatus::HalfOpen
                }
            }
        }
    }

    /// Whether a call may contact the backend now
    pub fn allow(&self) -> bool {
        !matches!(self.status(), BreakerStatus::Open(_))
    }

    pub fn record_success(&self) {
        let mut state = self.state();
        if state.opened_at.is_some() {
            info!("Classification backend recovered, circuit closed");
        }
        state.consecutive_failures = 0;
        state.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut state = self.state();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        if state.consecutive_failures >= self.config.failure_threshold {
            warn!(
                failures = state.consecutive_failures,
                cooldown_secs = self.config.cooldown.as_secs(),
                "Circuit open, pausing classification backend calls"
            );
            state.opened_at = Some(Instant::now());
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state().consecutive_failures
    }
}

/// Result of a guarded call
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Response(String),
    /// Every attempt failed; carries the last error text
    Exhausted { attempts: u32, last_error: String },
    /// Refused without contacting the backend
    CircuitOpen,
}

impl CallOutcome {
    /// The response text, or `None` for "no response this pass"
    pub fn into_response(self) -> Option<String> {
        match self {
            Self::Response(text) => Some(text),
            _ => None,
        }
    }
}

/// A backend behind retry and a circuit breaker
pub struct ResilientBackend<B> {
    backend: B,
    policy: RetryPolicy,
    breaker: CircuitBreaker,
}

impl<B: ClassificationBackend> ResilientBackend<B> {
    pub fn new(backend: B, policy: RetryPolicy, breaker: BreakerConfig) -> Self {
        Self {
            backend,
            policy,
            breaker: CircuitBreaker::new(breaker),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Classify with retries; never returns an error
    pub async fn classify(&self, request: &ClassificationRequest) -> CallOutcome {
        let mut last_error = String::new();
        let mut attempts = 0;

        for attempt in 1..=self.policy.max_attempts.max(1) {
            if !self.breaker.allow() {
                warn!(attempt, "Circuit open, skipping classification call");
                return if attempts == 0 {
                    CallOutcome::CircuitOpen
                } else {
                    CallOutcome::Exhausted {
                        attempts,
                        last_error,
                    }
                };
            }

            attempts = attempt;
            match self.backend.classify(request).await {
                Ok(text) => {
                    self.breaker.record_success();
                    return CallOutcome::Response(text);
                }
                Err(e) => {
                    last_error = e.to_string();
                    let kind = FailureKind::classify(&last_error);
                    warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        kind = kind.as_str(),
                        error = %last_error,
                        "Classification call failed"
                    );
                    self.breaker.record_failure();

                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.delay_for(attempt, kind)).await;
                    }
                }
            }
        }

        CallOutcome::Exhausted {
            attempts,
            last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;

    fn request() -> ClassificationRequest {
        ClassificationRequest::new("prompt", vec![1, 2, 3], "image/png")
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn test_failure_kinds() {
        assert_eq!(
            FailureKind::classify("Gemini returned 429 Too Many Requests"),
            FailureKind::RateLimit
        );
        assert_eq!(
            FailureKind::classify("Quota exceeded for model"),
            FailureKind::RateLimit
        );
        assert_eq!(
            FailureKind::classify("operation timed out"),
            FailureKind::Timeout
        );
        assert_eq!(
            FailureKind::classify("503 Service Unavailable"),
            FailureKind::Unavailable
        );
        assert_eq!(FailureKind::classify("bad api key"), FailureKind::Other);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(1, FailureKind::Timeout), Duration::from_secs(2));
        assert_eq!(p.delay_for(2, FailureKind::Timeout), Duration::from_secs(4));
        assert_eq!(p.delay_for(3, FailureKind::Other), Duration::from_secs(8));
        assert_eq!(p.delay_for(10, FailureKind::Other), Duration::from_secs(30));
        assert_eq!(
            p.delay_for(1, FailureKind::RateLimit),
            Duration::from_secs(10)
        );
        assert!(p.delay_for(2, FailureKind::RateLimit) > p.delay_for(2, FailureKind::Other));
        assert_eq!(
            p.delay_for(8, FailureKind::RateLimit),
            Duration::from_secs(60)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let mock = MockBackend::new()
            .with_failure("503 unavailable")
            .with_response("{\"tipo\": \"egreso\"}");
        let calls = mock.call_counter();
        let backend = ResilientBackend::new(mock, policy(3), BreakerConfig::default());

        let outcome = backend.classify(&request()).await;
        assert_eq!(outcome, CallOutcome::Response("{\"tipo\": \"egreso\"}".into()));
        assert_eq!(calls.get(), 2);
        assert_eq!(backend.breaker().consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_gives_no_response() {
        let mock = MockBackend::failing("connection refused");
        let calls = mock.call_counter();
        let backend = ResilientBackend::new(mock, policy(3), BreakerConfig::default());

        let outcome = backend.classify(&request()).await;
        assert!(matches!(outcome, CallOutcome::Exhausted { attempts: 3, .. }));
        assert_eq!(outcome.into_response(), None);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_short_circuits_after_threshold() {
        let mock = MockBackend::failing("503 unavailable");
        let calls = mock.call_counter();
        let backend = ResilientBackend::new(
            mock,
            policy(1),
            BreakerConfig {
                failure_threshold: 3,
                cooldown: Duration::from_secs(120),
            },
        );

        for _ in 0..3 {
            backend.classify(&request()).await;
        }
        assert_eq!(calls.get(), 3);
        assert!(matches!(backend.breaker().status(), BreakerStatus::Open(_)));

        let outcome = backend.classify(&request()).await;
        assert_eq!(outcome, CallOutcome::CircuitOpen);
        assert_eq!(calls.get(), 3, "open breaker must not contact the backend");
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_stops_retries_mid_call() {
        let mock = MockBackend::failing("503 unavailable");
        let calls = mock.call_counter();
        let backend = ResilientBackend::new(
            mock,
            policy(5),
            BreakerConfig {
                failure_threshold: 2,
                cooldown: Duration::from_secs(120),
            },
        );

        let outcome = backend.classify(&request()).await;
        assert!(matches!(outcome, CallOutcome::Exhausted { attempts: 2, .. }));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_cooldown_resets() {
        let mock = MockBackend::new()
            .with_failure("503")
            .with_failure("503")
            .with_response("{}");
        let calls = mock.call_counter();
        let backend = ResilientBackend::new(
            mock,
            policy(1),
            BreakerConfig {
                failure_threshold: 2,
                cooldown: Duration::from_secs(120),
            },
        );

        backend.classify(&request()).await;
        backend.classify(&request()).await;
        assert_eq!(backend.classify(&request()).await, CallOutcome::CircuitOpen);
        assert_eq!(calls.get(), 2);

        tokio::time::advance(Duration::from_secs(121)).await;
        assert_eq!(backend.breaker().status(), BreakerStatus::HalfOpen);

        let outcome = backend.classify(&request()).await;
        assert_eq!(outcome, CallOutcome::Response("{}".into()));
        assert_eq!(backend.breaker().consecutive_failures(), 0);
        assert_eq!(backend.breaker().status(), BreakerStatus::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let mock = MockBackend::failing("503");
        let backend = ResilientBackend::new(
            mock,
            policy(1),
            BreakerConfig {
                failure_threshold: 1,
                cooldown: Duration::from_secs(10),
            },
        );

        backend.classify(&request()).await;
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(backend.breaker().allow());

        backend.classify(&request()).await;
        assert!(matches!(backend.breaker().status(), BreakerStatus::Open(_)));
    }
}
