//! CLI command handlers. Each command is in its own file.

mod insert;
mod purge;
mod scan;

pub use insert::run_insert;
pub use purge::run_purge;
pub use scan::run_scan;
