//! Initialize the destination content store.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cli::commands::load_config;
use crate::config::resolve_db_path;
use crate::error::Result;
use crate::store::SqliteStore;

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    content_types: usize,
    taxonomies: usize,
    custom_field_keys: usize,
}

/// Execute the init command.
///
/// Opens (or creates) the database, applies the schema, and registers
/// the content model declared in the config file. Safe to run again:
/// registration replaces the previous model wholesale.
///
/// # Errors
///
/// Returns an error when the config cannot be loaded or the database
/// cannot be opened or written.
pub fn execute(config_path: Option<&Path>, db_path: Option<&Path>, json: bool) -> Result<()> {
    let (cfg, config_path) = load_config(config_path)?;
    let db = resolve_db_path(db_path, &config_path);

    if let Some(parent) = db.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut store = SqliteStore::open(&db)?;
    store.register_content_model(&cfg.content_model)?;

    let custom_field_keys = cfg
        .content_model
        .custom_fields
        .values()
        .map(Vec::len)
        .sum();

    if json {
        let output = InitOutput {
            database: db,
            content_types: cfg.content_model.content_types.len(),
            taxonomies: cfg.content_model.taxonomies.len(),
            custom_field_keys,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Initialized content store");
        println!("  Database:          {}", db.display());
        println!(
            "  Content types:     {}",
            cfg.content_model.content_types.len()
        );
        println!(
            "  Taxonomies:        {}",
            cfg.content_model.taxonomies.len()
        );
        println!("  Custom field keys: {custom_field_keys}");
    }

    Ok(())
}
