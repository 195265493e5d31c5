//! Cancellation and per-call timeouts for pipeline suspension points.
//!
//! Every engine suspends in exactly two ways: awaiting a store call, or
//! sleeping for a backoff. Both go through a `Control`, so a cancel request
//! (e.g. Ctrl-C in the CLI) stops the pipeline at the next suspension point
//! and nothing further is attempted.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::store::StoreError;

/// Error returned when a pipeline is stopped by its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pipeline cancelled by caller")
    }
}

impl std::error::Error for Cancelled {}

/// Cancellation token plus an optional bound on each store call.
///
/// Clones share the same token, so one `cancel()` reaches every engine
/// built from the same `Control`.
#[derive(Debug, Clone, Default)]
pub struct Control {
    token: CancellationToken,
    call_timeout: Option<Duration>,
}

impl Control {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every store call by `timeout`. A call that exceeds it fails
    /// with an I/O `TimedOut` store error.
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Await a store call, honouring cancellation and the call timeout.
    ///
    /// The outer `Result` is the cancellation outcome; the inner one is the
    /// store's own result (a timeout shows up there).
    pub async fn call<T, F>(&self, fut: F) -> Result<Result<T, StoreError>, Cancelled>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        if self.token.is_cancelled() {
            return Err(Cancelled);
        }
        let bounded = async {
            match self.call_timeout {
                Some(limit) => match tokio::time::timeout(limit, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(StoreError::timed_out(limit)),
                },
                None => fut.await,
            }
        };
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Cancelled),
            result = bounded => Ok(result),
        }
    }

    /// Sleep for `delay` unless cancelled first.
    pub async fn sleep(&self, delay: Duration) -> Result<(), Cancelled> {
        if self.token.is_cancelled() {
            return Err(Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
