//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bulkpipe_core::retry::RetryPolicy;
use bulkpipe_core::store::{InsertRequest, StoreError, WriteResponse, WriteStore};

/// Write store that fails its first `failures` calls with `make_error`,
/// then delegates to `inner`.
pub struct Flaky<S> {
    pub inner: S,
    pub failures: u32,
    pub calls: AtomicU32,
    pub make_error: fn() -> StoreError,
}

impl<S> Flaky<S> {
    pub fn new(inner: S, failures: u32, make_error: fn() -> StoreError) -> Self {
        Self {
            inner,
            failures,
            calls: AtomicU32::new(0),
            make_error,
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: WriteStore> WriteStore for Flaky<S> {
    async fn insert_all(&self, request: &InsertRequest) -> Result<WriteResponse, StoreError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err((self.make_error)());
        }
        self.inner.insert_all(request).await
    }
}

pub fn deadline_exceeded() -> StoreError {
    StoreError::remote("Deadline exceeded: request Timed Out")
}

pub fn connection_reset() -> StoreError {
    StoreError::wrapped(
        "insert failed",
        std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer reset"),
    )
}

pub fn bad_request() -> StoreError {
    StoreError::remote("400 Bad Request: no such field")
}

/// `attempts` tries with no waiting between them.
pub fn immediate_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(attempts)
        .unwrap()
        .with_backoff(|_| Duration::ZERO)
}

pub fn rows(n: usize) -> Vec<serde_json::Value> {
    (0..n).map(|i| serde_json::json!({ "n": i })).collect()
}
