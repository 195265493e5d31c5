//! Retry loop: drive a write until success, exhaustion, or a fatal failure.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::classify::{classify_partial, Classification, Classifier, WriteOutcome};
use super::policy::{RetryDecision, RetryPolicy};
use crate::control::Control;
use crate::diag;
use crate::error::PipelineError;
use crate::store::{InsertRequest, RowErrors, StoreError, WriteResponse, WriteStore};

/// Receives the elapsed time of each successful write attempt.
pub trait ElapsedSink: Send + Sync {
    fn record_elapsed(&self, elapsed: Duration);
}

impl<F> ElapsedSink for F
where
    F: Fn(Duration) + Send + Sync,
{
    fn record_elapsed(&self, elapsed: Duration) {
        self(elapsed)
    }
}

/// Retry policy, classifier and telemetry sink for one scheduler.
#[derive(Clone)]
pub struct RetryOptions {
    pub policy: RetryPolicy,
    pub classifier: Classifier,
    pub elapsed: Arc<dyn ElapsedSink>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            classifier: Classifier::default(),
            elapsed: Arc::new(|_: Duration| {}),
        }
    }
}

impl RetryOptions {
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_elapsed_sink(mut self, sink: impl ElapsedSink + 'static) -> Self {
        self.elapsed = Arc::new(sink);
        self
    }
}

/// Outcome of a write that eventually succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryReport {
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Store call time of the successful attempt.
    pub elapsed: Duration,
}

enum AttemptFailure {
    Total(StoreError),
    Partial { relevant: RowErrors, payload: String },
}

impl AttemptFailure {
    fn describe(&self) -> String {
        match self {
            AttemptFailure::Total(e) => e.to_string(),
            AttemptFailure::Partial { payload, .. } => payload.clone(),
        }
    }
}

/// Runs one write action at a time, at most `max_attempts` times.
pub struct RetryScheduler {
    options: RetryOptions,
    control: Control,
}

impl RetryScheduler {
    pub fn new(options: RetryOptions, control: Control) -> Self {
        Self { options, control }
    }

    pub fn control(&self) -> &Control {
        &self.control
    }

    /// Drive `action` until it succeeds or the policy says stop.
    ///
    /// `action` gets the 0-based attempt index. `target` names the table or
    /// collection in logs and errors.
    pub async fn run<F, Fut>(&self, target: &str, mut action: F) -> Result<RetryReport, PipelineError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<WriteResponse, StoreError>>,
    {
        let policy = &self.options.policy;
        let mut attempt = 0u32;
        loop {
            let started = Instant::now();
            let result = self.control.call(action(attempt)).await?;
            let elapsed = started.elapsed();

            let (classification, failure) = match self.options.classifier.outcome(result) {
                WriteOutcome::Success => {
                    self.options.elapsed.record_elapsed(elapsed);
                    tracing::debug!(target_name = target, attempt, ?elapsed, "write succeeded");
                    return Ok(RetryReport {
                        attempts: attempt + 1,
                        elapsed,
                    });
                }
                WriteOutcome::TransientFailure(e) => {
                    (Classification::Transient, AttemptFailure::Total(e))
                }
                WriteOutcome::PersistentFailure(e) => {
                    (Classification::ClientPersistent, AttemptFailure::Total(e))
                }
                WriteOutcome::PartialFailure(raw) => {
                    let (classification, relevant) = classify_partial(&raw);
                    let payload = diag::stringify(&relevant);
                    (classification, AttemptFailure::Partial { relevant, payload })
                }
            };

            match policy.decide(attempt, classification) {
                RetryDecision::Fatal => {
                    return Err(fatal_error(target, attempt, failure));
                }
                RetryDecision::GiveUp => {
                    let attempts = attempt + 1;
                    tracing::warn!(
                        target_name = target,
                        attempts,
                        %classification,
                        "write failed, retry budget exhausted"
                    );
                    return Err(PipelineError::RetryExhausted {
                        target: target.to_string(),
                        attempts,
                        last_classification: classification,
                        last_failure: failure.describe(),
                    });
                }
                RetryDecision::RetryNow => {
                    tracing::warn!(
                        target_name = target,
                        attempt,
                        %classification,
                        failure = %failure.describe(),
                        "write failed, retrying"
                    );
                }
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        target_name = target,
                        attempt,
                        %classification,
                        ?delay,
                        failure = %failure.describe(),
                        "write failed, retrying after backoff"
                    );
                    self.control.sleep(delay).await?;
                }
            }
            attempt += 1;
        }
    }
}

fn fatal_error(target: &str, attempt: u32, failure: AttemptFailure) -> PipelineError {
    match failure {
        AttemptFailure::Total(source) => {
            tracing::error!(
                target_name = target,
                attempt,
                error = %source,
                "client side failure, not retrying"
            );
            PipelineError::ClientPersistent {
                target: target.to_string(),
                attempt,
                source,
            }
        }
        AttemptFailure::Partial { relevant, payload } => {
            tracing::error!(
                target_name = target,
                attempt,
                insert_errors = %payload,
                "persistent row errors, unable to retry"
            );
            PipelineError::PartialPersistent {
                target: target.to_string(),
                attempt,
                errors: relevant,
                payload,
            }
        }
    }
}

/// Insert `request` through `scheduler`, logging the request rows when the
/// store rejects them persistently.
pub async fn insert_all_with_retries<S>(
    store: &S,
    request: &InsertRequest,
    scheduler: &RetryScheduler,
) -> Result<RetryReport, PipelineError>
where
    S: WriteStore + ?Sized,
{
    let result = scheduler
        .run(&request.collection, |_| store.insert_all(request))
        .await;
    if let Err(PipelineError::PartialPersistent { .. }) = &result {
        tracing::error!(
            collection = %request.collection,
            rows_stringify = %diag::stringify(&request.rows),
            "insert rejected with persistent row errors"
        );
    }
    result
}
