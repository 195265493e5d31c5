//! Classify total and partial write failures for retry decisions.

use std::error::Error;
use std::fmt;

use crate::store::{RowErrors, StoreError, WriteResponse};

/// Message fragments that mark a total failure as transient.
pub const DEFAULT_TRANSIENT_MARKERS: [&str; 3] = ["timed out", "retrying limits", "502"];

/// Row error reasons that will fail identically on every retry.
pub const PERSISTENT_REASONS: [&str; 3] = ["invalid", "invalidQuery", "notImplemented"];

/// Retry classification of a failed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Total failure expected to clear up (timeouts, throttling, 502, I/O).
    Transient,
    /// Total failure caused by the request itself. Never retried.
    ClientPersistent,
    /// Row-level failures without a persistent reason.
    PartialRetryable,
    /// Row-level failures with at least one persistent reason. Never retried.
    PartialPersistent,
}

impl Classification {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Classification::Transient | Classification::PartialRetryable
        )
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Classification::Transient => "transient",
            Classification::ClientPersistent => "client-persistent",
            Classification::PartialRetryable => "partial-retryable",
            Classification::PartialPersistent => "partial-persistent",
        };
        f.write_str(s)
    }
}

/// A failure handed to the classifier.
#[derive(Debug, Clone, Copy)]
pub enum Failure<'a> {
    /// The whole call failed.
    Total(&'a (dyn Error + 'static)),
    /// The call returned per-row errors.
    Partial(&'a RowErrors),
}

/// Result of one write attempt, before any retry decision.
#[derive(Debug)]
pub enum WriteOutcome {
    Success,
    TransientFailure(StoreError),
    PartialFailure(RowErrors),
    PersistentFailure(StoreError),
}

/// Failure classifier with a configurable set of transient markers.
#[derive(Debug, Clone)]
pub struct Classifier {
    transient_markers: Vec<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_transient_markers(DEFAULT_TRANSIENT_MARKERS)
    }
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the transient markers. Matching is case-insensitive.
    pub fn with_transient_markers<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            transient_markers: markers
                .into_iter()
                .map(|m| m.as_ref().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn transient_markers(&self) -> &[String] {
        &self.transient_markers
    }

    pub fn classify(&self, failure: Failure<'_>) -> Classification {
        match failure {
            Failure::Total(err) => self.classify_total(err),
            Failure::Partial(errors) => classify_partial(errors).0,
        }
    }

    /// Transient if any error in the source chain mentions a transient marker
    /// or is an I/O error; client-persistent otherwise.
    pub fn classify_total(&self, err: &(dyn Error + 'static)) -> Classification {
        let mentions_marker = chain(err).any(|e| {
            let text = e.to_string().to_lowercase();
            self.transient_markers.iter().any(|m| text.contains(m.as_str()))
        });
        if mentions_marker || find_in_chain::<std::io::Error>(err).is_some() {
            Classification::Transient
        } else {
            Classification::ClientPersistent
        }
    }

    /// Turn the raw result of an attempt into a [`WriteOutcome`].
    pub fn outcome(&self, result: Result<WriteResponse, StoreError>) -> WriteOutcome {
        match result {
            Ok(response) if !response.has_errors() => WriteOutcome::Success,
            Ok(response) => WriteOutcome::PartialFailure(response.row_errors),
            Err(err) => match self.classify_total(&err) {
                Classification::Transient => WriteOutcome::TransientFailure(err),
                _ => WriteOutcome::PersistentFailure(err),
            },
        }
    }
}

/// Drop rows whose errors are all `stopped`: those rows only failed because
/// a sibling row did.
pub fn filter_relevant(errors: &RowErrors) -> RowErrors {
    errors
        .iter()
        .filter(|(_, row)| row.iter().any(|e| !e.is_noise()))
        .map(|(index, row)| (*index, row.clone()))
        .collect()
}

/// True if any error carries a reason from [`PERSISTENT_REASONS`].
pub fn contains_persistent(errors: &RowErrors) -> bool {
    errors
        .values()
        .flatten()
        .any(|e| PERSISTENT_REASONS.contains(&e.reason.as_str()))
}

/// Filter noise, then classify what is left. An empty filtered map is still
/// retryable: the store reported a failure, just not a useful one.
pub fn classify_partial(errors: &RowErrors) -> (Classification, RowErrors) {
    let relevant = filter_relevant(errors);
    let classification = if contains_persistent(&relevant) {
        Classification::PartialPersistent
    } else {
        Classification::PartialRetryable
    };
    (classification, relevant)
}

fn chain<'a>(err: &'a (dyn Error + 'static)) -> impl Iterator<Item = &'a (dyn Error + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

/// First error of type `T` in `err`'s source chain, `err` included.
pub fn find_in_chain<'a, T: Error + 'static>(err: &'a (dyn Error + 'static)) -> Option<&'a T> {
    chain(err).find_map(|e| e.downcast_ref::<T>())
}
