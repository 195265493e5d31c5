pub mod config;
pub mod logging;

pub mod auth;
pub mod commit;
pub mod control;
pub mod diag;
pub mod error;
pub mod ids;
pub mod paginate;
pub mod retry;
pub mod store;
pub mod timestamp;

pub use commit::BatchedCommitter;
pub use control::{Cancelled, Control};
pub use error::PipelineError;
pub use paginate::PaginatedReader;
pub use retry::{Classification, Classifier, RetryOptions, RetryPolicy, RetryScheduler};
