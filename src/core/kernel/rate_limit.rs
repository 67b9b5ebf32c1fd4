use crate::core::errors::SourceError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

/// Token-bucket admission control plus exponential-backoff retry.
///
/// One instance per external provider: a throttled provider only burns its
/// own budget. The bucket refills continuously from elapsed time, it is not
/// discretized into ticks. `tokens` stays within `[0, capacity]`.
pub struct RateLimiter {
    provider: String,
    capacity: f64,
    refill_per_second: f64,
    max_retries: u32,
    base_delay: Duration,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Floor for the refill rate. A zero or negative rate would turn `acquire`
/// into an unbounded (and with f64 division, panicking) wait.
const MIN_REFILL_PER_SECOND: f64 = 1e-6;

impl RateLimiter {
    /// Create a limiter with `capacity` burst tokens refilled at
    /// `refill_per_second`. Both are clamped to usable minimums.
    pub fn new(provider: impl Into<String>, capacity: u32, refill_per_second: f64) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            provider: provider.into(),
            capacity,
            refill_per_second: refill_per_second.max(MIN_REFILL_PER_SECOND),
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Set how many consecutive throttle responses are retried before the
    /// operation fails permanently.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay for exponential backoff.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_second).min(self.capacity);
        state.last_refill = now;
    }

    /// Currently available tokens (after refill).
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.tokens
    }

    /// Suspend until at least one token is available, then consume it.
    ///
    /// Admission is best-effort by availability; no FIFO fairness across
    /// waiters is guaranteed.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                let deficit = 1.0 - state.tokens;
                Duration::from_secs_f64(deficit / self.refill_per_second)
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Backoff delay after the `attempt`-th consecutive throttle response
    /// (1-based): `2^attempt * base_delay` plus uniform jitter. `None` once
    /// the retry budget is spent.
    pub fn backoff_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let exponential = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        let jitter_ms = if self.base_delay.is_zero() {
            0
        } else {
            rand::thread_rng().gen_range(0..self.base_delay.as_millis().max(1) as u64)
        };
        Some(exponential + Duration::from_millis(jitter_ms))
    }

    /// Run `op` under admission control, retrying throttle responses
    /// (HTTP 429/503) with exponential backoff.
    ///
    /// After `max_retries` consecutive throttles the call fails with
    /// [`SourceError::RateLimitExceeded`] and no further request is issued.
    /// Every other error propagates unchanged.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, SourceError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut throttles = 0u32;
        loop {
            self.acquire().await;
            match op().await {
                Err(e) if e.is_throttled() => {
                    throttles += 1;
                    match self.backoff_delay(throttles) {
                        Some(delay) => {
                            warn!(
                                provider = %self.provider,
                                attempt = throttles,
                                delay_ms = delay.as_millis() as u64,
                                "provider throttled request, backing off"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            return Err(SourceError::RateLimitExceeded {
                                provider: self.provider.clone(),
                                attempts: throttles,
                            })
                        }
                    }
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn bucket_refills_continuously_and_caps_at_capacity() {
        let limiter = RateLimiter::new("test", 5, 2.0);

        // Drain the initial burst.
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(limiter.available().await < 1.0);

        // After 1.5s at 2 tokens/s we should hold 3 tokens.
        tokio::time::advance(Duration::from_millis(1500)).await;
        let available = limiter.available().await;
        assert!((available - 3.0).abs() < 1e-6, "available = {available}");

        // Refill never exceeds capacity.
        tokio::time::advance(Duration::from_secs(60)).await;
        let available = limiter.available().await;
        assert!((available - 5.0).abs() < 1e-6, "available = {available}");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_refill_rate_is_clamped_instead_of_panicking() {
        let limiter = RateLimiter::new("test", 1, 0.0);
        limiter.acquire().await;

        // The clamped rate makes the wait finite; under the paused clock it
        // elapses virtually.
        let before = Instant::now();
        limiter.acquire().await;
        let waited = before.elapsed();
        assert!(waited >= Duration::from_secs(999_000), "waited {waited:?}");
        assert!(limiter.available().await < 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_waits_for_refill() {
        let limiter = RateLimiter::new("test", 1, 1.0);
        limiter.acquire().await;

        let before = Instant::now();
        limiter.acquire().await;
        let waited = before.elapsed();
        assert!(waited >= Duration::from_millis(999), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn throttles_exhaust_into_rate_limit_exceeded() {
        let limiter = RateLimiter::new("discogs", 10, 100.0).with_max_retries(3);
        let calls = Arc::new(AtomicU32::new(0));

        let counted = calls.clone();
        let result: Result<(), _> = limiter
            .execute(|| {
                let counted = counted.clone();
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Err(SourceError::remote("/search", Some(429), "slow down"))
                }
            })
            .await;

        match result {
            Err(SourceError::RateLimitExceeded { provider, attempts }) => {
                assert_eq!(provider, "discogs");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        // Exactly max_retries requests were issued, none after the failure.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_throttle_recovers() {
        let limiter = RateLimiter::new("musicbrainz", 10, 100.0).with_max_retries(3);
        let calls = Arc::new(AtomicU32::new(0));

        let counted = calls.clone();
        let result = limiter
            .execute(|| {
                let counted = counted.clone();
                async move {
                    if counted.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(SourceError::remote("/ws/2", Some(503), "busy"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn non_throttle_errors_propagate_unchanged() {
        let limiter = RateLimiter::new("itunes", 10, 100.0);
        let result: Result<(), _> = limiter
            .execute(|| async { Err(SourceError::NotFound("nope".into())) })
            .await;
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }
}
