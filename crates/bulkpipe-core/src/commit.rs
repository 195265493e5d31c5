//! Batched sequential commits.
//!
//! Keys are pulled from a lazy stream into a buffer of at most
//! `max_batch_size`. Each full buffer (and the non-empty remainder at the
//! end) is committed as one atomic write against the store that owns the
//! keys. Only one commit is in flight, so memory stays bounded by the batch
//! size no matter how long the input is.

use std::sync::Arc;

use futures::stream::{Stream, TryStreamExt};

use crate::control::Control;
use crate::error::PipelineError;
use crate::retry::Classifier;
use crate::store::{Batch, BatchStore, StoreKey};

/// Add a committed batch to the running total; overflow is an error.
pub fn checked_add_total(total: u64, batch: usize) -> Result<u64, PipelineError> {
    u64::try_from(batch)
        .ok()
        .and_then(|n| total.checked_add(n))
        .ok_or(PipelineError::Overflow { total, batch })
}

/// Store instance shared by every key of `batch`.
///
/// Keys from different instances in one batch are a caller bug and are
/// reported, never re-routed.
pub fn owning_store<K: StoreKey>(batch: &Batch<K>) -> Result<Arc<K::Store>, PipelineError> {
    let Some((first, rest)) = batch.keys().split_first() else {
        return Err(PipelineError::InvalidConfig(
            "empty batch has no owning store".to_string(),
        ));
    };
    let store = first.store();
    if let Some(offset) = rest.iter().position(|k| !Arc::ptr_eq(store, k.store())) {
        return Err(PipelineError::MixedStores {
            position: offset + 1,
        });
    }
    Ok(Arc::clone(store))
}

pub struct BatchedCommitter {
    max_batch_size: usize,
    control: Control,
    classifier: Classifier,
    total: u64,
    commits: u64,
}

impl BatchedCommitter {
    pub fn new(max_batch_size: usize, control: Control) -> Result<Self, PipelineError> {
        if max_batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_batch_size,
            control,
            classifier: Classifier::default(),
            total: 0,
            commits: 0,
        })
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Commit every key from `keys` and return how many were committed.
    ///
    /// An upstream error, a failed commit, or cancellation stops the run;
    /// keys already committed stay committed.
    pub async fn commit<K, St>(mut self, keys: St) -> Result<u64, PipelineError>
    where
        K: StoreKey,
        St: Stream<Item = Result<K, PipelineError>>,
    {
        let mut keys = std::pin::pin!(keys);
        let mut buffer = Vec::with_capacity(self.max_batch_size);
        while let Some(key) = keys.try_next().await? {
            buffer.push(key);
            if buffer.len() >= self.max_batch_size {
                let full = std::mem::replace(&mut buffer, Vec::with_capacity(self.max_batch_size));
                self.commit_buffer(full).await?;
            }
        }
        self.commit_buffer(buffer).await?;
        tracing::info!(
            total = self.total,
            commits = self.commits,
            "batched commit complete"
        );
        Ok(self.total)
    }

    async fn commit_buffer<K: StoreKey>(&mut self, keys: Vec<K>) -> Result<(), PipelineError> {
        let Some(batch) = Batch::new(keys) else {
            return Ok(());
        };
        let store = owning_store(&batch)?;
        match self.control.call(store.commit_batch(&batch)).await? {
            Ok(()) => {}
            Err(source) => {
                let classification = self.classifier.classify_total(&source);
                tracing::warn!(
                    committed = self.total,
                    batch = batch.len(),
                    %classification,
                    error = %source,
                    "batch commit failed"
                );
                return Err(PipelineError::Store {
                    classification,
                    source,
                });
            }
        }
        self.total = checked_add_total(self.total, batch.len())?;
        self.commits += 1;
        tracing::debug!(batch = batch.len(), total = self.total, "committed batch");
        Ok(())
    }
}
