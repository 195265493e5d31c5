//! Retry and backoff for bulk writes.
//!
//! This module encapsulates failure classification (transient markers, I/O
//! causes, row-level noise filtering) and the bounded retry loop, so every
//! caller that writes in bulk shares one consistent policy.

mod classify;
mod policy;
mod run;

pub use classify::{
    classify_partial, contains_persistent, filter_relevant, find_in_chain, Classification,
    Classifier, Failure, WriteOutcome, DEFAULT_TRANSIENT_MARKERS, PERSISTENT_REASONS,
};
pub use policy::{exponential_backoff, BackoffFn, RetryDecision, RetryPolicy};
pub use run::{insert_all_with_retries, ElapsedSink, RetryOptions, RetryReport, RetryScheduler};
