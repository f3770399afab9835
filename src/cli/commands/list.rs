//! List configured table mappings.

use std::path::Path;

use colored::Colorize;

use crate::cli::commands::load_config;
use crate::error::Result;

/// Execute the list command.
///
/// # Errors
///
/// Returns an error when the config cannot be loaded.
pub fn execute(config_path: Option<&Path>, json: bool) -> Result<()> {
    let (cfg, _) = load_config(config_path)?;

    if json {
        let tables: Vec<serde_json::Value> = cfg
            .tables
            .iter()
            .map(|t| {
                serde_json::json!({
                    "table_id": t.table_id,
                    "name": t.name,
                    "content_type": t.content_type,
                    "view": t.view,
                    "rules": t.fields.len(),
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(tables));
        return Ok(());
    }

    if cfg.tables.is_empty() {
        println!("{}", "No table mappings configured.".dimmed());
        return Ok(());
    }

    println!("Table mappings ({} configured):", cfg.tables.len());
    println!();
    println!(
        "{}",
        format!(
            "{:<20} {:<16} {:<14} {:<20} {:>5}",
            "TABLE ID", "NAME", "CONTENT TYPE", "VIEW", "RULES"
        )
        .dimmed()
    );
    for table in &cfg.tables {
        println!(
            "{:<20} {:<16} {:<14} {:<20} {:>5}",
            table.table_id,
            table.name.as_deref().unwrap_or("-"),
            table.content_type,
            table.view.as_deref().unwrap_or("-"),
            table.fields.len()
        );
    }

    Ok(())
}
