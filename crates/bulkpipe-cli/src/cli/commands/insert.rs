//! `bulkpipe insert <collection> <file>` – chunked inserts, each retried.

use anyhow::{Context, Result};
use bulkpipe_core::config::BulkpipeConfig;
use bulkpipe_core::retry::insert_all_with_retries;
use bulkpipe_core::store::{InsertRequest, SqliteStore};
use bulkpipe_core::{Control, RetryScheduler};
use std::path::Path;

/// One JSON value per non-blank line.
pub(crate) fn parse_json_lines(text: &str) -> Result<Vec<serde_json::Value>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}: invalid JSON", n + 1))
        })
        .collect()
}

pub async fn run_insert(
    store: &SqliteStore,
    cfg: &BulkpipeConfig,
    control: Control,
    collection: &str,
    path: &Path,
) -> Result<()> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let rows = parse_json_lines(&text)?;
    let total = rows.len();
    let scheduler = RetryScheduler::new(cfg.retry_options()?, control);

    let mut inserted = 0usize;
    for request in InsertRequest::chunked(collection, rows, cfg.insert_batch_size) {
        let report = insert_all_with_retries(store, &request, &scheduler)
            .await
            .with_context(|| format!("inserted {inserted} of {total} rows before failure"))?;
        inserted += request.rows.len();
        tracing::debug!(
            collection,
            rows = request.rows.len(),
            attempts = report.attempts,
            "chunk inserted"
        );
    }

    println!("Inserted {inserted} rows into {collection}");
    Ok(())
}
