//! CLI for the bulkpipe record pipeline.

mod commands;

use anyhow::Result;
use bulkpipe_core::config;
use bulkpipe_core::store::SqliteStore;
use bulkpipe_core::Control;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use commands::{run_insert, run_purge, run_scan};

/// Top-level CLI for bulkpipe.
#[derive(Debug, Parser)]
#[command(name = "bulkpipe")]
#[command(about = "bulkpipe: retried bulk inserts, paginated scans and batched purges", long_about = None)]
pub struct Cli {
    /// Database file (default: ~/.local/state/bulkpipe/store.db).
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Insert JSON lines from a file into a collection, with retries.
    Insert {
        /// Target collection.
        collection: String,
        /// File with one JSON object per line.
        path: PathBuf,
    },

    /// Print every record of a collection as JSON lines.
    Scan {
        collection: String,
        /// Records per fetch (default from config).
        #[arg(long, value_name = "N")]
        page_size: Option<usize>,
    },

    /// Delete every record of a collection in batches.
    Purge {
        collection: String,
        /// Keys per atomic delete (default from config).
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,
        /// Records per fetch (default from config).
        #[arg(long, value_name = "N")]
        page_size: Option<usize>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        let store = match &cli.db {
            Some(path) => SqliteStore::open_at(path).await?,
            None => SqliteStore::open_default().await?,
        };
        let store = Arc::new(store);

        let control = cfg.control()?;
        cancel_on_ctrl_c(&control);

        match cli.command {
            CliCommand::Insert { collection, path } => {
                run_insert(&store, &cfg, control, &collection, &path).await?;
            }
            CliCommand::Scan {
                collection,
                page_size,
            } => {
                if let Some(n) = page_size {
                    cfg.page_size = n;
                }
                run_scan(&store, &cfg, control, &collection).await?;
            }
            CliCommand::Purge {
                collection,
                batch_size,
                page_size,
            } => {
                if let Some(n) = page_size {
                    cfg.page_size = n;
                }
                if let Some(n) = batch_size {
                    cfg.write_batch_size = n;
                }
                run_purge(&store, &cfg, control, &collection).await?;
            }
        }

        Ok(())
    }
}

/// First Ctrl-C cancels the running pipeline at its next suspension point.
fn cancel_on_ctrl_c(control: &Control) {
    let control = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            control.cancel();
        }
    });
}

#[cfg(test)]
mod tests;
