//! SQLite implementation of the content and asset stores.
//!
//! One connection backs both traits; imported asset files land in an
//! assets directory next to the database (or wherever the caller
//! points it).

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use serde_json::{Map, Value};

use crate::store::schema::apply_schema;
use crate::store::{
    AssetRef, AssetStore, ContentItem, ContentModel, ContentStatus, ContentStore, StoreError,
    StoreResult, META_EXTERNAL_ID,
};

/// SQLite-backed content + asset store.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    assets_dir: PathBuf,
}

impl SqliteStore {
    /// Open a database at the given path, with the assets directory
    /// defaulting to `assets/` beside it.
    ///
    /// Creates the database and applies the schema if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// schema fails to apply.
    pub fn open(db_path: &Path) -> StoreResult<Self> {
        let assets_dir = db_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("assets");
        Self::open_with_assets_dir(db_path, &assets_dir)
    }

    /// Open a database with an explicit assets directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// schema fails to apply.
    pub fn open_with_assets_dir(db_path: &Path, assets_dir: &Path) -> StoreResult<Self> {
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        apply_schema(&conn)?;
        Ok(Self {
            conn,
            assets_dir: assets_dir.to_path_buf(),
        })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory(assets_dir: &Path) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn,
            assets_dir: assets_dir.to_path_buf(),
        })
    }

    /// Underlying connection, for read-side queries.
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Replace the registered content model with the given one.
    ///
    /// Used by `airsync init`; registering the same model twice is a
    /// no-op in effect.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; nothing is changed in
    /// that case.
    pub fn register_content_model(&mut self, model: &ContentModel) -> StoreResult<()> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM content_types", [])?;
        tx.execute("DELETE FROM taxonomies", [])?;
        tx.execute("DELETE FROM custom_field_keys", [])?;

        for content_type in &model.content_types {
            tx.execute(
                "INSERT OR IGNORE INTO content_types (name) VALUES (?1)",
                [content_type],
            )?;
        }
        for taxonomy in &model.taxonomies {
            tx.execute(
                "INSERT OR IGNORE INTO taxonomies (key) VALUES (?1)",
                [taxonomy],
            )?;
        }
        for (content_type, keys) in &model.custom_fields {
            for key in keys {
                tx.execute(
                    "INSERT OR IGNORE INTO custom_field_keys (content_type, key) VALUES (?1, ?2)",
                    params![content_type, key],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Stored core attributes of an item (read-side helper).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the item does not exist.
    pub fn get_attrs(&self, item_id: i64) -> StoreResult<Map<String, Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT attrs FROM content_items WHERE id = ?1",
                [item_id],
                |row| row.get(0),
            )
            .optional()?;
        let raw = raw.ok_or(StoreError::ItemNotFound(item_id))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Stored custom-field value of an item (read-side helper).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_custom_field(&self, item_id: i64, key: &str) -> StoreResult<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM custom_fields WHERE item_id = ?1 AND key = ?2",
                params![item_id, key],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Stored terms for `(item, taxonomy)`, sorted (read-side helper).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_taxonomy_terms(&self, item_id: i64, taxonomy: &str) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT term FROM taxonomy_terms WHERE item_id = ?1 AND taxonomy = ?2 ORDER BY term",
        )?;
        let terms = stmt
            .query_map(params![item_id, taxonomy], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(terms)
    }

    /// Featured asset of an item, if one is assigned (read-side helper).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_featured_asset(&self, item_id: i64) -> StoreResult<Option<AssetRef>> {
        let asset: Option<Option<AssetRef>> = self
            .conn
            .query_row(
                "SELECT featured_asset_id FROM content_items WHERE id = ?1",
                params![item_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(asset.flatten())
    }
}

impl FromSql for ContentStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().and_then(|s| {
            Self::parse(s).ok_or_else(|| FromSqlError::Other("unknown content status".into()))
        })
    }
}

impl ToSql for ContentStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl ContentStore for SqliteStore {
    fn find_by_external_id(
        &self,
        content_type: &str,
        external_id: &str,
    ) -> StoreResult<Option<ContentItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT ci.id, ci.content_type, ci.status
             FROM content_items ci
             JOIN item_metadata m ON m.item_id = ci.id
             WHERE ci.content_type = ?1 AND m.key = ?2 AND m.value = ?3
             LIMIT 1",
        )?;

        let item = stmt
            .query_row(params![content_type, META_EXTERNAL_ID, external_id], |row| {
                Ok(ContentItem {
                    id: row.get(0)?,
                    content_type: row.get(1)?,
                    status: row.get(2)?,
                })
            })
            .optional()?;

        Ok(item)
    }

    fn create(&mut self, content_type: &str, attrs: &Map<String, Value>) -> StoreResult<i64> {
        let now = chrono::Utc::now().timestamp_millis();
        let attrs_json = serde_json::to_string(attrs)?;

        self.conn.execute(
            "INSERT INTO content_items (content_type, status, attrs, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![content_type, ContentStatus::Published, attrs_json, now],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn update(&mut self, item_id: i64, attrs: &Map<String, Value>) -> StoreResult<()> {
        let mut merged = self.get_attrs(item_id)?;
        for (key, value) in attrs {
            merged.insert(key.clone(), value.clone());
        }

        let now = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            "UPDATE content_items SET attrs = ?1, updated_at = ?2 WHERE id = ?3",
            params![serde_json::to_string(&merged)?, now, item_id],
        )?;
        Ok(())
    }

    fn set_status(&mut self, item_id: i64, status: ContentStatus) -> StoreResult<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let changed = self.conn.execute(
            "UPDATE content_items SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status, now, item_id],
        )?;
        if changed == 0 {
            return Err(StoreError::ItemNotFound(item_id));
        }
        Ok(())
    }

    fn set_metadata(&mut self, item_id: i64, key: &str, value: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO item_metadata (item_id, key, value) VALUES (?1, ?2, ?3)",
            params![item_id, key, value],
        )?;
        Ok(())
    }

    fn get_metadata(&self, item_id: i64, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM item_metadata WHERE item_id = ?1 AND key = ?2",
                params![item_id, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_custom_field(&mut self, item_id: i64, key: &str, value: &Value) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO custom_fields (item_id, key, value) VALUES (?1, ?2, ?3)",
            params![item_id, key, serde_json::to_string(value)?],
        )?;
        Ok(())
    }

    fn assign_taxonomy_terms(
        &mut self,
        item_id: i64,
        taxonomy: &str,
        terms: &[String],
    ) -> StoreResult<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "DELETE FROM taxonomy_terms WHERE item_id = ?1 AND taxonomy = ?2",
            params![item_id, taxonomy],
        )?;
        for term in terms {
            tx.execute(
                "INSERT OR IGNORE INTO taxonomy_terms (item_id, taxonomy, term) VALUES (?1, ?2, ?3)",
                params![item_id, taxonomy, term],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn assign_featured_asset(&mut self, item_id: i64, asset: AssetRef) -> StoreResult<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let changed = self.conn.execute(
            "UPDATE content_items SET featured_asset_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![asset, now, item_id],
        )?;
        if changed == 0 {
            return Err(StoreError::ItemNotFound(item_id));
        }
        Ok(())
    }

    fn list_published_with_external_id(&self, content_type: &str) -> StoreResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT ci.id
             FROM content_items ci
             JOIN item_metadata m ON m.item_id = ci.id AND m.key = ?2
             WHERE ci.content_type = ?1 AND ci.status = ?3
             ORDER BY ci.id",
        )?;

        let ids = stmt
            .query_map(
                params![content_type, META_EXTERNAL_ID, ContentStatus::Published],
                |row| row.get(0),
            )?
            .collect::<rusqlite::Result<Vec<i64>>>()?;

        Ok(ids)
    }

    fn get_external_id(&self, item_id: i64) -> StoreResult<Option<String>> {
        self.get_metadata(item_id, META_EXTERNAL_ID)
    }

    fn content_model(&self) -> StoreResult<ContentModel> {
        let mut model = ContentModel::default();

        let mut stmt = self.conn.prepare("SELECT name FROM content_types ORDER BY name")?;
        model.content_types = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        let mut stmt = self.conn.prepare("SELECT key FROM taxonomies ORDER BY key")?;
        model.taxonomies = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT content_type, key FROM custom_field_keys ORDER BY content_type, key",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<(String, String)>>>()?;
        for (content_type, key) in rows {
            model.custom_fields.entry(content_type).or_default().push(key);
        }

        Ok(model)
    }
}

impl AssetStore for SqliteStore {
    fn import(
        &mut self,
        tmp_path: &Path,
        filename: &str,
        mime_hint: Option<&str>,
    ) -> StoreResult<AssetRef> {
        std::fs::create_dir_all(&self.assets_dir)
            .map_err(|e| StoreError::Import(format!("creating assets dir: {e}")))?;

        let safe = safe_filename(filename);
        let dest = unique_destination(&self.assets_dir, safe);
        std::fs::copy(tmp_path, &dest)
            .map_err(|e| StoreError::Import(format!("copying {safe}: {e}")))?;

        let now = chrono::Utc::now().timestamp_millis();
        let stored_path = dest.to_string_lossy().into_owned();
        let inserted = self.conn.execute(
            "INSERT INTO assets (filename, mime, stored_path, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![safe, mime_hint, stored_path, now],
        );
        if let Err(e) = inserted {
            // Keep the directory and database consistent.
            let _ = std::fs::remove_file(&dest);
            return Err(StoreError::Import(format!("recording {safe}: {e}")));
        }

        Ok(self.conn.last_insert_rowid())
    }
}

/// Final path component of a (possibly URL-derived) filename.
fn safe_filename(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or("attachment")
}

/// First non-colliding destination path for a filename in a directory.
fn unique_destination(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map_or_else(|| filename.to_string(), |s| s.to_string_lossy().into_owned());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut n = 1u32;
    loop {
        let name = match &ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        let candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_test_store(tmp: &TempDir) -> SqliteStore {
        SqliteStore::open_memory(tmp.path()).unwrap()
    }

    fn attrs(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_create_and_find_by_external_id() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_test_store(&tmp);

        let id = store
            .create("person", &attrs(&[("title", json!("Ada Lovelace"))]))
            .unwrap();
        store.set_metadata(id, META_EXTERNAL_ID, "rec123").unwrap();

        let found = store.find_by_external_id("person", "rec123").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.content_type, "person");
        assert_eq!(found.status, ContentStatus::Published);

        assert!(store.find_by_external_id("person", "rec999").unwrap().is_none());
        assert!(store.find_by_external_id("project", "rec123").unwrap().is_none());
    }

    #[test]
    fn test_find_includes_drafted_items() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_test_store(&tmp);

        let id = store.create("person", &Map::new()).unwrap();
        store.set_metadata(id, META_EXTERNAL_ID, "recD").unwrap();
        store.set_status(id, ContentStatus::Draft).unwrap();

        // Lookup is status-independent so a drafted orphan can be revived
        // as an update, not a duplicate create.
        let found = store.find_by_external_id("person", "recD").unwrap().unwrap();
        assert_eq!(found.status, ContentStatus::Draft);
    }

    #[test]
    fn test_update_merges_attrs() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_test_store(&tmp);

        let id = store
            .create(
                "person",
                &attrs(&[("title", json!("Ada")), ("body", json!("Original bio"))]),
            )
            .unwrap();
        store.update(id, &attrs(&[("title", json!("Ada Lovelace"))])).unwrap();

        let stored = store.get_attrs(id).unwrap();
        assert_eq!(stored.get("title").unwrap(), "Ada Lovelace");
        assert_eq!(stored.get("body").unwrap(), "Original bio");
    }

    #[test]
    fn test_update_missing_item() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_test_store(&tmp);
        let err = store.update(42, &Map::new()).unwrap_err();
        assert!(matches!(err, StoreError::ItemNotFound(42)));
    }

    #[test]
    fn test_metadata_upsert_keeps_last_value() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_test_store(&tmp);

        let id = store.create("person", &Map::new()).unwrap();
        store.set_metadata(id, "last_modified", "2024-01-01T00:00:00").unwrap();
        store.set_metadata(id, "last_modified", "2024-02-02T00:00:00").unwrap();

        assert_eq!(
            store.get_metadata(id, "last_modified").unwrap().as_deref(),
            Some("2024-02-02T00:00:00")
        );
        assert_eq!(store.get_metadata(id, "missing").unwrap(), None);
    }

    #[test]
    fn test_custom_field_round_trip() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_test_store(&tmp);

        let id = store.create("person", &Map::new()).unwrap();
        store
            .set_custom_field(id, "social_channels", &json!([{"social_link": {"url": "https://x.example"}}]))
            .unwrap();
        store.set_custom_field(id, "first_name", &json!("Ada")).unwrap();
        store.set_custom_field(id, "first_name", &json!("Augusta Ada")).unwrap();

        assert_eq!(
            store.get_custom_field(id, "first_name").unwrap().unwrap(),
            json!("Augusta Ada")
        );
        assert!(store.get_custom_field(id, "missing").unwrap().is_none());
    }

    #[test]
    fn test_taxonomy_assignment_replaces_set() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_test_store(&tmp);

        let id = store.create("person", &Map::new()).unwrap();
        store
            .assign_taxonomy_terms(id, "department", &["Engineering".to_string(), "Design".to_string()])
            .unwrap();
        store
            .assign_taxonomy_terms(id, "department", &["Research".to_string()])
            .unwrap();

        assert_eq!(store.get_taxonomy_terms(id, "department").unwrap(), ["Research"]);
    }

    #[test]
    fn test_list_published_with_external_id() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_test_store(&tmp);

        let with_marker = store.create("person", &Map::new()).unwrap();
        store.set_metadata(with_marker, META_EXTERNAL_ID, "recA").unwrap();

        let drafted = store.create("person", &Map::new()).unwrap();
        store.set_metadata(drafted, META_EXTERNAL_ID, "recB").unwrap();
        store.set_status(drafted, ContentStatus::Draft).unwrap();

        // Manually created item without a marker: never an orphan candidate.
        let manual = store.create("person", &Map::new()).unwrap();

        let other_type = store.create("project", &Map::new()).unwrap();
        store.set_metadata(other_type, META_EXTERNAL_ID, "recC").unwrap();

        let ids = store.list_published_with_external_id("person").unwrap();
        assert_eq!(ids, vec![with_marker]);
        assert!(!ids.contains(&manual));
    }

    #[test]
    fn test_asset_import_copies_file() {
        let tmp = TempDir::new().unwrap();
        let assets = tmp.path().join("media");
        let mut store = SqliteStore::open_memory(&assets).unwrap();

        let staged = tmp.path().join("staged.bin");
        std::fs::write(&staged, b"image bytes").unwrap();

        let asset = store.import(&staged, "photo.jpg", Some("image/jpeg")).unwrap();
        assert!(asset > 0);
        assert_eq!(std::fs::read(assets.join("photo.jpg")).unwrap(), b"image bytes");

        // Same filename again lands under a collision-safe name.
        let second = store.import(&staged, "photo.jpg", Some("image/jpeg")).unwrap();
        assert!(second > asset);
        assert!(assets.join("photo-1.jpg").exists());
    }

    #[test]
    fn test_asset_import_strips_path_components() {
        let tmp = TempDir::new().unwrap();
        let assets = tmp.path().join("media");
        let mut store = SqliteStore::open_memory(&assets).unwrap();

        let staged = tmp.path().join("staged.bin");
        std::fs::write(&staged, b"x").unwrap();

        store.import(&staged, "../escape/../../evil.png", None).unwrap();
        assert!(assets.join("evil.png").exists());
    }

    #[test]
    fn test_content_model_registration_round_trip() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_test_store(&tmp);

        let mut model = ContentModel {
            content_types: vec!["person".to_string(), "project".to_string()],
            taxonomies: vec!["department".to_string()],
            ..ContentModel::default()
        };
        model
            .custom_fields
            .insert("person".to_string(), vec!["first_name".to_string()]);

        store.register_content_model(&model).unwrap();
        let loaded = store.content_model().unwrap();
        assert_eq!(loaded.content_types, ["person", "project"]);
        assert_eq!(loaded.taxonomies, ["department"]);
        assert_eq!(loaded.custom_fields["person"], ["first_name"]);

        // Re-registering a smaller model replaces, not appends.
        let smaller = ContentModel {
            content_types: vec!["person".to_string()],
            ..ContentModel::default()
        };
        store.register_content_model(&smaller).unwrap();
        let loaded = store.content_model().unwrap();
        assert_eq!(loaded.content_types, ["person"]);
        assert!(loaded.taxonomies.is_empty());
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("photo.jpg"), "photo.jpg");
        assert_eq!(safe_filename("a/b/photo.jpg"), "photo.jpg");
        assert_eq!(safe_filename("..\\evil.png"), "evil.png");
        assert_eq!(safe_filename(""), "attachment");
        assert_eq!(safe_filename(".."), "attachment");
    }
}
