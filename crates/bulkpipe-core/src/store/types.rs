//! Request, response and page types exchanged with a store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Row error reason that only shows up because a sibling row failed.
pub const STOPPED_REASON: &str = "stopped";

/// A single row-level error reported by a bulk write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// Position of the row in the request.
    pub index: i64,
    /// Machine-readable reason, e.g. `invalid` or `stopped`.
    pub reason: String,
    /// Human-readable message from the store.
    pub message: String,
}

impl RowError {
    pub fn new(index: i64, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// True for the `stopped` marker, which carries no signal of its own.
    pub fn is_noise(&self) -> bool {
        self.reason.eq_ignore_ascii_case(STOPPED_REASON)
    }
}

/// Row errors keyed by row index in the originating request.
pub type RowErrors = BTreeMap<i64, Vec<RowError>>;

/// Response of a bulk write that reached the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteResponse {
    pub row_errors: RowErrors,
}

impl WriteResponse {
    pub fn with_errors(row_errors: RowErrors) -> Self {
        Self { row_errors }
    }

    pub fn has_errors(&self) -> bool {
        !self.row_errors.is_empty()
    }
}

/// A bulk insert of JSON rows into one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertRequest {
    pub collection: String,
    pub rows: Vec<serde_json::Value>,
}

impl InsertRequest {
    pub fn new(collection: impl Into<String>, rows: Vec<serde_json::Value>) -> Self {
        Self {
            collection: collection.into(),
            rows,
        }
    }

    /// Split a large insert into requests of at most `chunk_size` rows each.
    /// Row order is preserved across and within chunks.
    pub fn chunked(
        collection: &str,
        rows: Vec<serde_json::Value>,
        chunk_size: usize,
    ) -> Vec<InsertRequest> {
        let chunk_size = chunk_size.max(1);
        let mut out = Vec::with_capacity(rows.len().div_ceil(chunk_size));
        let mut current = Vec::with_capacity(chunk_size.min(rows.len()));
        for row in rows {
            current.push(row);
            if current.len() == chunk_size {
                out.push(InsertRequest::new(collection, std::mem::take(&mut current)));
            }
        }
        if !current.is_empty() {
            out.push(InsertRequest::new(collection, current));
        }
        out
    }
}

/// One page of query results, in store order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }
}

impl<T> From<Vec<T>> for Page<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// A non-empty group of keys committed as one atomic write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<K> {
    keys: Vec<K>,
}

impl<K> Batch<K> {
    /// Returns `None` for an empty key list; empty batches are never committed.
    pub fn new(keys: Vec<K>) -> Option<Self> {
        if keys.is_empty() {
            None
        } else {
            Some(Self { keys })
        }
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
