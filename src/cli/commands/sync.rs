//! Sync command implementation.
//!
//! Runs one reconciliation pass per selected table mapping, sharing a
//! single API client and content store across tables. A fetch abort on
//! one table is reported for that table and counted once in the grand
//! totals; remaining tables still run.

use std::path::Path;

use colored::Colorize;

use crate::airtable::AirtableClient;
use crate::cli::commands::load_config;
use crate::config::{resolve_db_path, TableMapping};
use crate::error::{Error, Result};
use crate::store::{ContentStore, SqliteStore};
use crate::sync::{SyncEngine, SyncStats};

/// Execute the sync command.
///
/// # Errors
///
/// Returns an error when the config is missing or invalid, when the
/// named table has no mapping, or when the database cannot be opened.
/// Per-table fetch failures are absorbed into the statistics instead.
pub fn execute(
    table_id: Option<&str>,
    config_path: Option<&Path>,
    db_path: Option<&Path>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;

    rt.block_on(async { execute_async(table_id, config_path, db_path, dry_run, json).await })
}

async fn execute_async(
    table_id: Option<&str>,
    config_path: Option<&Path>,
    db_path: Option<&Path>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let (cfg, config_path) = load_config(config_path)?;

    if cfg.tables.is_empty() {
        return Err(Error::NoMappings);
    }
    if !cfg.credentials.is_complete() {
        return Err(Error::MissingCredentials);
    }

    let selected: Vec<&TableMapping> = match table_id {
        Some(id) => vec![cfg.mapping_for_table(id).ok_or_else(|| {
            Error::MappingNotFound {
                table_id: id.to_string(),
            }
        })?],
        None => cfg.tables.iter().collect(),
    };

    let db = resolve_db_path(db_path, &config_path);
    let store = SqliteStore::open(&db)?;
    cfg.validate(&store.content_model()?)?;

    let client = AirtableClient::new(&cfg.credentials);
    let mut engine = SyncEngine::new(client, store, dry_run);

    let mut totals = SyncStats::default();
    let mut entries: Vec<serde_json::Value> = Vec::new();

    for mapping in &selected {
        if !json {
            print_table_header(mapping, dry_run);
        }

        match engine.sync_table(mapping).await {
            Ok(stats) => {
                totals.absorb(&stats);
                if json {
                    entries.push(serde_json::json!({
                        "table_id": mapping.table_id,
                        "name": mapping.name,
                        "stats": stats,
                    }));
                } else {
                    print_stats(&stats);
                    println!();
                }
            }
            Err(e) => {
                totals.errors += 1;
                if json {
                    entries.push(serde_json::json!({
                        "table_id": mapping.table_id,
                        "name": mapping.name,
                        "error": e.to_string(),
                    }));
                } else {
                    println!("  {} {e}", "Sync failed:".red().bold());
                    println!();
                }
            }
        }
    }

    if json {
        let output = serde_json::json!({
            "dry_run": dry_run,
            "tables": entries,
            "totals": totals,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if table_id.is_none() {
        println!("{}", "Totals".bold().underline());
        print_stats(&totals);
        println!();
    }

    if totals.errors > 0 {
        println!(
            "{}",
            format!("Sync completed with {} error(s).", totals.errors)
                .yellow()
                .bold()
        );
    } else {
        println!("{}", "Sync complete.".green());
    }
    if dry_run {
        println!("{}", "Dry run - no changes were written.".dimmed());
    }

    Ok(())
}

fn print_table_header(mapping: &TableMapping, dry_run: bool) {
    let mut header = match &mapping.name {
        Some(name) => format!("{name} ({})", mapping.table_id),
        None => mapping.table_id.clone(),
    };
    if dry_run {
        header.push_str(" [dry run]");
    }
    println!("{}", header.bold());
}

fn print_stats(stats: &SyncStats) {
    println!("  Processed:   {}", stats.processed);
    println!("  Created:     {}", stats.created.to_string().green());
    println!("  Updated:     {}", stats.updated.to_string().yellow());
    println!("  Skipped:     {}", stats.skipped);
    if stats.unpublished > 0 {
        println!("  Unpublished: {}", stats.unpublished.to_string().yellow());
    } else {
        println!("  Unpublished: {}", stats.unpublished);
    }
    if stats.errors > 0 {
        println!("  Errors:      {}", stats.errors.to_string().red());
    } else {
        println!("  Errors:      {}", stats.errors);
    }
}
