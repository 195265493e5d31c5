//! Total (request-level) store failure.

use std::io;
use std::time::Duration;

/// Error returned when a store call fails as a whole, as opposed to the
/// row-level errors carried by a [`WriteResponse`](super::WriteResponse).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store rejected the call; the text is the provider's message.
    #[error("{0}")]
    Remote(String),
    /// Transport-level I/O failure (includes timed-out calls).
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),
    /// SQLite driver failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Provider error wrapping a lower-level cause.
    #[error("{message}")]
    Wrapped {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl StoreError {
    pub fn remote(message: impl Into<String>) -> Self {
        StoreError::Remote(message.into())
    }

    pub fn wrapped(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StoreError::Wrapped {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// A store call that did not complete within `limit`.
    pub fn timed_out(limit: Duration) -> Self {
        StoreError::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("store call timed out after {limit:?}"),
        ))
    }
}
