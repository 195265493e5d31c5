use super::*;
use std::path::Path;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn cli_parse_insert() {
    let cli = parse(&["bulkpipe", "insert", "events", "rows.jsonl"]);
    assert!(cli.db.is_none());
    match cli.command {
        CliCommand::Insert { collection, path } => {
            assert_eq!(collection, "events");
            assert_eq!(path, Path::new("rows.jsonl"));
        }
        _ => panic!("expected Insert"),
    }
}

#[test]
fn cli_parse_scan_defaults() {
    match parse(&["bulkpipe", "scan", "events"]).command {
        CliCommand::Scan {
            collection,
            page_size,
        } => {
            assert_eq!(collection, "events");
            assert!(page_size.is_none());
        }
        _ => panic!("expected Scan"),
    }
}

#[test]
fn cli_parse_purge_with_sizes() {
    match parse(&[
        "bulkpipe",
        "purge",
        "events",
        "--batch-size",
        "250",
        "--page-size",
        "2000",
    ])
    .command
    {
        CliCommand::Purge {
            collection,
            batch_size,
            page_size,
        } => {
            assert_eq!(collection, "events");
            assert_eq!(batch_size, Some(250));
            assert_eq!(page_size, Some(2000));
        }
        _ => panic!("expected Purge"),
    }
}

#[test]
fn cli_parse_global_db_after_subcommand() {
    let cli = parse(&["bulkpipe", "scan", "events", "--db", "/tmp/x.db"]);
    assert_eq!(cli.db.as_deref(), Some(Path::new("/tmp/x.db")));
}

#[test]
fn cli_parse_global_db_before_subcommand() {
    let cli = parse(&["bulkpipe", "--db", "/tmp/x.db", "purge", "events"]);
    assert_eq!(cli.db.as_deref(), Some(Path::new("/tmp/x.db")));
    assert!(matches!(cli.command, CliCommand::Purge { .. }));
}

#[test]
fn cli_rejects_missing_collection() {
    assert!(Cli::try_parse_from(["bulkpipe", "scan"]).is_err());
}

#[test]
fn cli_rejects_non_numeric_page_size() {
    assert!(Cli::try_parse_from(["bulkpipe", "scan", "events", "--page-size", "lots"]).is_err());
}
