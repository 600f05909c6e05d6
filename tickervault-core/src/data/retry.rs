//! Bounded retry with exponential backoff on rate limiting.
//!
//! Rate-limited attempts wait `base_timeout * 2^attempt + U(0, jitter_max)`;
//! transient failures wait the fixed request-pacing delay; fatal failures
//! stop immediately. Running out of attempts is a soft failure: `run`
//! returns `None` and the caller logs and moves on.

use super::provider::{DataError, FailureClass};
use crate::config::FetchConfig;
use rand::Rng;
use std::time::Duration;

/// Blocking pause between requests. Production uses `ThreadPacer`.
pub trait Pacer: Send + Sync {
    fn pause(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Retry policy for one remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_timeout: Duration,
    pub jitter_max: Duration,
    /// Fixed wait after a non-rate-limit failure.
    pub pacing_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            base_timeout: config.base_timeout,
            jitter_max: config.jitter_max,
            pacing_delay: config.request_delay,
        }
    }

    /// Backoff before jitter: `base_timeout * 2^attempt` (saturating).
    pub fn backoff_floor(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_timeout.saturating_mul(factor)
    }

    /// Full rate-limit wait for the given zero-based attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let jitter = if self.jitter_max.is_zero() {
            Duration::ZERO
        } else {
            let secs = rand::thread_rng().gen_range(0.0..=self.jitter_max.as_secs_f64());
            Duration::from_secs_f64(secs)
        };
        self.backoff_floor(attempt).saturating_add(jitter)
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// `op` receives the zero-based attempt number. No wait follows the
    /// final attempt.
    pub fn run<T, F, C>(&self, label: &str, classify: C, pacer: &dyn Pacer, mut op: F) -> Option<T>
    where
        F: FnMut(u32) -> Result<T, DataError>,
        C: Fn(&DataError) -> FailureClass,
    {
        for attempt in 0..self.max_retries {
            tracing::debug!(
                op = label,
                attempt = attempt + 1,
                max = self.max_retries,
                "remote request"
            );
            let err = match op(attempt) {
                Ok(value) => return Some(value),
                Err(e) => e,
            };
            let last = attempt + 1 == self.max_retries;

            match classify(&err) {
                FailureClass::Fatal => {
                    tracing::error!(op = label, error = %err, "non-retryable failure");
                    return None;
                }
                FailureClass::RateLimited => {
                    if last {
                        tracing::warn!(op = label, "rate limited on final attempt");
                    } else {
                        let wait = self.backoff(attempt);
                        tracing::warn!(
                            op = label,
                            wait_secs = wait.as_secs_f64(),
                            "rate limited, backing off before retry"
                        );
                        pacer.pause(wait);
                    }
                }
                FailureClass::Transient => {
                    tracing::error!(op = label, attempt = attempt + 1, error = %err, "request failed");
                    if !last {
                        pacer.pause(self.pacing_delay);
                    }
                }
            }
        }
        tracing::error!(
            op = label,
            attempts = self.max_retries,
            "giving up after exhausting retries"
        );
        None
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingPacer;
    use super::*;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_timeout: Duration::from_secs(30),
            jitter_max: Duration::from_secs(3),
            pacing_delay: Duration::from_secs(2),
        }
    }

    fn rate_limited() -> DataError {
        DataError::RateLimited {
            retry_after_secs: None,
        }
    }

    #[test]
    fn backoff_doubles_with_bounded_jitter() {
        let p = policy(5);
        assert_eq!(p.backoff_floor(0), Duration::from_secs(30));
        assert_eq!(p.backoff_floor(1), Duration::from_secs(60));
        assert_eq!(p.backoff_floor(3), Duration::from_secs(240));
        for attempt in 0..4 {
            let wait = p.backoff(attempt);
            assert!(wait >= p.backoff_floor(attempt));
            assert!(wait <= p.backoff_floor(attempt) + Duration::from_secs(3));
        }
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let p = policy(5);
        assert_eq!(p.backoff_floor(40), Duration::from_secs(30).saturating_mul(u32::MAX));
    }

    #[test]
    fn exhausted_rate_limit_returns_none_after_max_attempts() {
        let pacer = RecordingPacer::default();
        let mut calls = 0;
        let out: Option<()> = policy(3).run("AAPL", DataError::class, &pacer, |_| {
            calls += 1;
            Err(rate_limited())
        });
        assert!(out.is_none());
        assert_eq!(calls, 3);

        let pauses = pacer.taken();
        assert_eq!(pauses.len(), 2);
        assert!(pauses[0] >= Duration::from_secs(30) && pauses[0] <= Duration::from_secs(33));
        assert!(pauses[1] >= Duration::from_secs(60) && pauses[1] <= Duration::from_secs(63));
    }

    #[test]
    fn transient_failure_uses_fixed_delay_then_succeeds() {
        let pacer = RecordingPacer::default();
        let out = policy(5).run("MSFT", DataError::class, &pacer, |attempt| {
            if attempt < 2 {
                Err(DataError::NetworkUnreachable("timeout".into()))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(out, Some(2));
        assert_eq!(pacer.taken(), vec![Duration::from_secs(2); 2]);
    }

    #[test]
    fn fatal_failure_stops_immediately() {
        let pacer = RecordingPacer::default();
        let mut calls = 0;
        let out: Option<()> = policy(5).run("ZZZZ", DataError::class, &pacer, |_| {
            calls += 1;
            Err(DataError::SymbolNotFound {
                symbol: "ZZZZ".into(),
            })
        });
        assert!(out.is_none());
        assert_eq!(calls, 1);
        assert!(pacer.taken().is_empty());
    }

    #[test]
    fn from_config_never_allows_zero_attempts() {
        let config = FetchConfig {
            max_retries: 0,
            ..FetchConfig::default()
        };
        assert_eq!(RetryPolicy::from_config(&config).max_retries, 1);
    }
}
