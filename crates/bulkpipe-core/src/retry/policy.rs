use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::classify::Classification;
use crate::error::PipelineError;

/// Maps a zero-based attempt index to the wait before the next attempt.
pub type BackoffFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Decision returned by the retry policy after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Failure can never succeed; stop now.
    Fatal,
    /// Retryable failure but no attempts left.
    GiveUp,
    /// Retry right away (zero backoff).
    RetryNow,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Bounded attempts plus a caller-supplied backoff function.
///
/// The default is a single attempt with no backoff.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: BackoffFn,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Arc::new(|_| Duration::ZERO),
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first attempt and must be at least 1.
    pub fn new(max_attempts: u32) -> Result<Self, PipelineError> {
        if max_attempts < 1 {
            return Err(PipelineError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            ..Self::default()
        })
    }

    pub fn with_backoff<F>(mut self, backoff: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.backoff = Arc::new(backoff);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff_for(&self, attempt_index: u32) -> Duration {
        (self.backoff)(attempt_index)
    }

    /// Decide what follows a failed attempt. `attempt_index` is 0-based.
    ///
    /// The backoff function is only consulted when another attempt will
    /// follow; exhausting the budget never pays a final wait.
    pub fn decide(&self, attempt_index: u32, classification: Classification) -> RetryDecision {
        if !classification.is_retryable() {
            return RetryDecision::Fatal;
        }
        if attempt_index.saturating_add(1) >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        let delay = self.backoff_for(attempt_index);
        if delay.is_zero() {
            RetryDecision::RetryNow
        } else {
            RetryDecision::RetryAfter(delay)
        }
    }
}

/// Exponential backoff: `base * 2^attempt_index`, capped at `max`.
pub fn exponential_backoff(
    base: Duration,
    max: Duration,
) -> impl Fn(u32) -> Duration + Send + Sync + 'static {
    move |attempt_index| {
        let exp = 1u32 << attempt_index.min(16);
        base.saturating_mul(exp).min(max)
    }
}
