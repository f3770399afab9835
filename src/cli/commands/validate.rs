//! Validate the mapping configuration.

use std::path::Path;

use colored::Colorize;

use crate::cli::commands::load_config;
use crate::config::resolve_db_path;
use crate::error::Result;
use crate::store::{ContentStore, SqliteStore};

/// Execute the validate command.
///
/// Checks credentials and every table mapping against the registered
/// content model. Before `init` has run (no database file yet), the
/// model declared in the config file stands in as the referent.
///
/// # Errors
///
/// Returns [`crate::error::Error::Validation`] with one message per
/// problem; the exit code reflects validity.
pub fn execute(config_path: Option<&Path>, db_path: Option<&Path>, json: bool) -> Result<()> {
    let (cfg, config_path) = load_config(config_path)?;
    let db = resolve_db_path(db_path, &config_path);

    let model = if db.exists() {
        SqliteStore::open(&db)?.content_model()?
    } else {
        cfg.content_model.clone()
    };

    cfg.validate(&model)?;

    if json {
        let output = serde_json::json!({
            "valid": true,
            "tables": cfg.tables.len(),
        });
        println!("{output}");
    } else {
        println!("{}", "Configuration is valid.".green());
        println!("  {} table mapping(s) checked", cfg.tables.len());
    }

    Ok(())
}
