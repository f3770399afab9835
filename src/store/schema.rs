//! Database schema for the destination content store.

use rusqlite::{Connection, Result};

/// The complete SQLite schema.
///
/// Timestamps are stored as INTEGER Unix milliseconds. Sync markers
/// (`external_id`, `last_modified`, `last_synced`) live in
/// `item_metadata`, mirroring how the engine addresses items.
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Content
-- ====================

CREATE TABLE IF NOT EXISTS content_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content_type TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'published',
    attrs TEXT NOT NULL DEFAULT '{}',
    featured_asset_id INTEGER REFERENCES assets(id),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_content_items_type_status
    ON content_items(content_type, status);

-- Item metadata: sync markers and anything else keyed per item
CREATE TABLE IF NOT EXISTS item_metadata (
    item_id INTEGER NOT NULL REFERENCES content_items(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (item_id, key)
);

CREATE INDEX IF NOT EXISTS idx_item_metadata_lookup ON item_metadata(key, value);

-- Custom fields: one row per (item, key), value stored as JSON
CREATE TABLE IF NOT EXISTS custom_fields (
    item_id INTEGER NOT NULL REFERENCES content_items(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (item_id, key)
);

-- Taxonomy terms: the full set per (item, taxonomy) is replaced on assignment
CREATE TABLE IF NOT EXISTS taxonomy_terms (
    item_id INTEGER NOT NULL REFERENCES content_items(id) ON DELETE CASCADE,
    taxonomy TEXT NOT NULL,
    term TEXT NOT NULL,
    PRIMARY KEY (item_id, taxonomy, term)
);

CREATE INDEX IF NOT EXISTS idx_taxonomy_terms_term ON taxonomy_terms(taxonomy, term);

-- ====================
-- Assets
-- ====================

CREATE TABLE IF NOT EXISTS assets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    mime TEXT,
    stored_path TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

-- ====================
-- Registered content model (populated by `airsync init`)
-- ====================

CREATE TABLE IF NOT EXISTS content_types (
    name TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS taxonomies (
    key TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS custom_field_keys (
    content_type TEXT NOT NULL,
    key TEXT NOT NULL,
    PRIMARY KEY (content_type, key)
);
";

/// Apply pragmas and the schema; safe to call on every open.
///
/// # Errors
///
/// Returns an error if a pragma or DDL statement fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    conn.execute_batch(SCHEMA_SQL)
}
