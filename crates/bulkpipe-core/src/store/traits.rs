//! Collaborator seams the engines drive. Implementations own the transport.

use std::sync::Arc;

use async_trait::async_trait;

use super::error::StoreError;
use super::types::{Batch, InsertRequest, Page, WriteResponse};

/// A store that accepts bulk inserts.
///
/// `Err` is a total failure; row-level failures come back inside the
/// `WriteResponse`.
#[async_trait]
pub trait WriteStore: Send + Sync {
    async fn insert_all(&self, request: &InsertRequest) -> Result<WriteResponse, StoreError>;
}

#[async_trait]
impl<T: WriteStore + ?Sized> WriteStore for Arc<T> {
    async fn insert_all(&self, request: &InsertRequest) -> Result<WriteResponse, StoreError> {
        (**self).insert_all(request).await
    }
}

/// A query that can be resumed strictly after a cursor.
#[async_trait]
pub trait QueryStore: Send + Sync {
    type Item: Send + Sync;
    type Cursor: Clone + Send + Sync;

    /// Cursor that resumes right after `item`.
    fn cursor_of(item: &Self::Item) -> Self::Cursor;

    /// Fetch at most `limit` items after `after` (from the start when `None`).
    /// An empty page means the sequence is exhausted.
    async fn query(
        &self,
        after: Option<&Self::Cursor>,
        limit: usize,
    ) -> Result<Page<Self::Item>, StoreError>;
}

/// A store that commits a batch of keys as one atomic write.
#[async_trait]
pub trait BatchStore<K: Send + Sync>: Send + Sync {
    async fn commit_batch(&self, batch: &Batch<K>) -> Result<(), StoreError>;
}

/// A mutation key that knows which store instance it belongs to.
pub trait StoreKey: Send + Sync + Sized {
    type Store: BatchStore<Self> + ?Sized;

    fn store(&self) -> &Arc<Self::Store>;
}
