//! Store seams and the SQLite backend.
//!
//! The pipeline engines only ever see the traits in this module. Anything
//! with a network transport (or a local database) plugs in by implementing
//! `WriteStore`, `QueryStore` or `BatchStore`.

mod error;
mod sqlite;
mod traits;
mod types;

pub use error::StoreError;
pub use sqlite::{Record, RecordKey, SqliteCollection, SqliteStore};
pub use traits::{BatchStore, QueryStore, StoreKey, WriteStore};
pub use types::{
    Batch, InsertRequest, Page, RowError, RowErrors, WriteResponse, STOPPED_REASON,
};
