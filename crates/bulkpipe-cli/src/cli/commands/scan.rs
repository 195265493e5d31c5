//! `bulkpipe scan <collection>` – stream all records as JSON lines.

use anyhow::Result;
use bulkpipe_core::config::BulkpipeConfig;
use bulkpipe_core::store::SqliteStore;
use bulkpipe_core::{Control, PaginatedReader};
use futures::TryStreamExt;
use std::io::Write;
use std::sync::Arc;

pub async fn run_scan(
    store: &Arc<SqliteStore>,
    cfg: &BulkpipeConfig,
    control: Control,
    collection: &str,
) -> Result<()> {
    let records = store.collection(collection);
    let reader = PaginatedReader::new(&records, cfg.page_size, control)?
        .with_classifier(cfg.classifier());
    let mut items = std::pin::pin!(reader.into_items());

    let mut out = std::io::stdout().lock();
    let mut n = 0u64;
    while let Some(record) = items.try_next().await? {
        serde_json::to_writer(&mut out, &record)?;
        writeln!(out)?;
        n += 1;
    }
    out.flush()?;
    tracing::info!(collection, records = n, "scan complete");
    Ok(())
}
