//! `bulkpipe purge <collection>` – paginate the collection and delete it in batches.

use anyhow::Result;
use bulkpipe_core::config::BulkpipeConfig;
use bulkpipe_core::store::SqliteStore;
use bulkpipe_core::{BatchedCommitter, Control, PaginatedReader};
use futures::TryStreamExt;
use std::sync::Arc;

pub async fn run_purge(
    store: &Arc<SqliteStore>,
    cfg: &BulkpipeConfig,
    control: Control,
    collection: &str,
) -> Result<()> {
    let records = store.collection(collection);
    let reader = PaginatedReader::new(&records, cfg.page_size, control.clone())?
        .with_classifier(cfg.classifier());
    let keys = reader.into_items().map_ok(|record| records.key(&record));

    let deleted = BatchedCommitter::new(cfg.write_batch_size, control)?
        .with_classifier(cfg.classifier())
        .commit(keys)
        .await?;

    println!("Deleted {deleted} records from {collection}");
    Ok(())
}
