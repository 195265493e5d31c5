//! Terminal outcomes surfaced by the pipeline engines.
//!
//! Transient and partial-retryable failures never appear here: the retry
//! scheduler absorbs them. Everything below reaches the caller.

use crate::control::Cancelled;
use crate::retry::Classification;
use crate::store::{RowErrors, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Total failure that will not succeed on retry.
    #[error("client side failure writing to {target} on attempt {attempt}, not retrying: {source}")]
    ClientPersistent {
        target: String,
        attempt: u32,
        #[source]
        source: StoreError,
    },
    /// Row-level failure with a persistent reason; `errors` has the
    /// `stopped` noise rows removed and `payload` is its JSON rendering.
    #[error("persistent row errors writing to {target} on attempt {attempt}: {payload}")]
    PartialPersistent {
        target: String,
        attempt: u32,
        errors: RowErrors,
        payload: String,
    },
    /// Every allowed attempt failed with a retryable failure.
    #[error("write to {target} failed after {attempts} attempts ({last_classification}: {last_failure})")]
    RetryExhausted {
        target: String,
        attempts: u32,
        last_classification: Classification,
        last_failure: String,
    },
    #[error("{0}")]
    Cancelled(#[from] Cancelled),
    /// The running commit total would not fit in a `u64`.
    #[error("commit total overflow: {total} + {batch}")]
    Overflow { total: u64, batch: usize },
    /// A page fetch or batch commit failed; reader and committer do not retry.
    #[error("{classification} store failure: {source}")]
    Store {
        classification: Classification,
        #[source]
        source: StoreError,
    },
    /// A batch held keys owned by more than one store instance.
    #[error("batch key at position {position} belongs to a different store instance than the first key")]
    MixedStores { position: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled(_))
    }

    /// Failures that will never succeed no matter how much retry budget is
    /// available (as opposed to `RetryExhausted`).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::ClientPersistent { .. }
                | PipelineError::PartialPersistent { .. }
                | PipelineError::Overflow { .. }
                | PipelineError::MixedStores { .. }
                | PipelineError::InvalidConfig(_)
        )
    }

    /// Classification of the underlying store failure, when there is one.
    pub fn classification(&self) -> Option<Classification> {
        match self {
            PipelineError::ClientPersistent { .. } => Some(Classification::ClientPersistent),
            PipelineError::PartialPersistent { .. } => Some(Classification::PartialPersistent),
            PipelineError::RetryExhausted {
                last_classification,
                ..
            } => Some(*last_classification),
            PipelineError::Store { classification, .. } => Some(*classification),
            _ => None,
        }
    }
}
