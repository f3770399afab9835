//! Mapping configuration.
//!
//! One JSON file declares the source credentials, the destination content
//! model, and the table mappings. It is loaded once per invocation into an
//! immutable [`Config`] value and threaded through explicitly; "reload" means
//! constructing a new value, never mutating shared state.
//!
//! Resolution order for the file itself: `--config` flag, then
//! `AIRSYNC_CONFIG`, then `./airsync.json`. The database lives beside the
//! config unless `--db` or `AIRSYNC_DB` says otherwise.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::ContentModel;
use crate::transform::FieldType;

/// Environment variable overriding the config file path.
pub const ENV_CONFIG: &str = "AIRSYNC_CONFIG";
/// Environment variable overriding the database path.
pub const ENV_DB: &str = "AIRSYNC_DB";
/// Environment variable overriding the configured API key.
pub const ENV_API_KEY: &str = "AIRTABLE_API_KEY";
/// Environment variable overriding the configured base id.
pub const ENV_BASE_ID: &str = "AIRTABLE_BASE_ID";

/// Default config filename, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "airsync.json";
/// Default database filename, resolved against the config directory.
pub const DEFAULT_DB_FILE: &str = "airsync.db";

/// Source API credentials. Opaque strings; treated as secrets.
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_id: String,
}

// Credentials must never reach logs, so Debug redacts both fields.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("base_id", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Whether both fields are present (non-blank).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.base_id.trim().is_empty()
    }
}

/// Where a transformed field value lands on the destination item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    /// Core item attribute (title, body, ...); last write wins per key.
    #[default]
    CoreAttribute,
    /// Taxonomy assignment; values accumulate per taxonomy key.
    TaxonomyTerm,
    /// Custom field; direct, link-property, or repeater semantics.
    CustomField,
}

/// Declared repeater accumulation mode.
///
/// Carried through from the mapping file and validated, but both modes
/// accumulate rows by append at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeaterMode {
    Append,
    SingleRow,
}

/// One field-mapping rule: source field → destination slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldRule {
    /// Stable source field identifier (never a display name).
    #[serde(default)]
    pub field_id: String,
    /// Declared source field type; unknown wire strings fall back to text.
    #[serde(default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub destination: DestinationKind,
    /// Destination key: attribute name, taxonomy key, or custom-field key.
    #[serde(default)]
    pub key: String,
    /// When set, the rule targets one subfield of a repeating structure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subfield: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeater_mode: Option<RepeaterMode>,
    /// When set, the rule fills one property of a composite link value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_property: Option<String>,
    /// Static label for structured link values built from url fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_content_type: Option<String>,
}

/// One table mapping: source table → destination content type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableMapping {
    #[serde(default)]
    pub table_id: String,
    /// Display label for operator output; falls back to the table id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub content_type: String,
    /// Optional saved-view filter applied at fetch time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldRule>,
}

impl TableMapping {
    /// Label used in operator-facing output.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.table_id)
    }
}

/// Full parsed configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub credentials: Credentials,
    /// Content types, taxonomies, and custom-field keys the destination
    /// accepts; registered by `init` and used as the validation referent.
    #[serde(default)]
    pub content_model: ContentModel,
    #[serde(default)]
    pub tables: Vec<TableMapping>,
}

impl Config {
    /// Load and parse a configuration file.
    ///
    /// Environment overrides are *not* applied here; call
    /// [`Config::apply_env_overrides`] afterwards so tests can load
    /// fixtures verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigNotFound`] when the file is missing and
    /// [`Error::Config`] when it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ConfigNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                Error::Io(e)
            }
        })?;

        serde_json::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Apply `AIRTABLE_API_KEY` / `AIRTABLE_BASE_ID` overrides when set
    /// and non-blank.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(ENV_API_KEY) {
            if !key.trim().is_empty() {
                self.credentials.api_key = key;
            }
        }
        if let Ok(base_id) = std::env::var(ENV_BASE_ID) {
            if !base_id.trim().is_empty() {
                self.credentials.base_id = base_id;
            }
        }
    }

    /// The mapping whose `table_id` matches, if any.
    #[must_use]
    pub fn mapping_for_table(&self, table_id: &str) -> Option<&TableMapping> {
        self.tables.iter().find(|t| t.table_id == table_id)
    }

    /// Validate the whole configuration against a content model.
    ///
    /// Itemized and never best-effort: every problem is collected before
    /// returning, and any problem blocks the configuration as a whole.
    /// Registry checks are skipped for registries the model leaves empty,
    /// so a config can be validated before `init` has run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] carrying one message per problem.
    pub fn validate(&self, model: &ContentModel) -> Result<()> {
        let mut errors = Vec::new();

        if self.credentials.api_key.trim().is_empty() {
            errors.push("credentials: api_key is missing".to_string());
        }
        if self.credentials.base_id.trim().is_empty() {
            errors.push("credentials: base_id is missing".to_string());
        }
        if self.tables.is_empty() {
            errors.push("no table mappings configured".to_string());
        }

        let mut seen_tables: HashSet<&str> = HashSet::new();
        for (table_index, table) in self.tables.iter().enumerate() {
            let label = if table.table_id.trim().is_empty() {
                format!("table #{}", table_index + 1)
            } else {
                format!("table \"{}\"", table.table_id)
            };

            if table.table_id.trim().is_empty() {
                errors.push(format!("{label}: table_id is missing"));
            } else if !seen_tables.insert(table.table_id.as_str()) {
                errors.push(format!("{label}: duplicate table_id"));
            }

            if table.content_type.trim().is_empty() {
                errors.push(format!("{label}: content_type is missing"));
            } else if !model.content_types.is_empty()
                && !model.has_content_type(&table.content_type)
            {
                errors.push(format!(
                    "{label}: content type \"{}\" is not registered",
                    table.content_type
                ));
            }

            for (rule_index, rule) in table.fields.iter().enumerate() {
                let rule_label = if rule.field_id.trim().is_empty() {
                    format!("{label}, rule #{}", rule_index + 1)
                } else {
                    format!("{label}, field \"{}\"", rule.field_id)
                };

                if rule.field_id.trim().is_empty() {
                    errors.push(format!("{rule_label}: field_id is missing"));
                }
                if rule.key.trim().is_empty() {
                    errors.push(format!("{rule_label}: key is missing"));
                }

                match rule.destination {
                    DestinationKind::CoreAttribute => {}
                    DestinationKind::TaxonomyTerm => {
                        if !rule.key.trim().is_empty()
                            && !model.taxonomies.is_empty()
                            && !model.has_taxonomy(&rule.key)
                        {
                            errors.push(format!(
                                "{rule_label}: taxonomy \"{}\" is not registered",
                                rule.key
                            ));
                        }
                    }
                    DestinationKind::CustomField => {
                        if !rule.key.trim().is_empty()
                            && !table.content_type.trim().is_empty()
                            && model.custom_field_registered(&table.content_type, &rule.key)
                                == Some(false)
                        {
                            errors.push(format!(
                                "{rule_label}: custom field \"{}\" is not registered for \"{}\"",
                                rule.key, table.content_type
                            ));
                        }
                    }
                }

                if rule.link_property.is_some()
                    && rule.destination != DestinationKind::CustomField
                {
                    errors.push(format!(
                        "{rule_label}: link_property is only valid on custom_field rules"
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation { errors })
        }
    }
}

/// Resolve the config file path.
///
/// Priority:
/// 1. Explicit path from the CLI flag
/// 2. `AIRSYNC_CONFIG` environment variable
/// 3. `./airsync.json`
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ENV_CONFIG) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Resolve the database path.
///
/// Priority:
/// 1. Explicit path from the CLI flag
/// 2. `AIRSYNC_DB` environment variable
/// 3. `airsync.db` beside the config file
#[must_use]
pub fn resolve_db_path(explicit: Option<&Path>, config_path: &Path) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ENV_DB) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(DEFAULT_DB_FILE),
        _ => PathBuf::from(DEFAULT_DB_FILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        serde_json::from_str(
            r#"{
                "credentials": { "api_key": "key123", "base_id": "appXYZ" },
                "content_model": {
                    "content_types": ["person"],
                    "taxonomies": ["department"],
                    "custom_fields": { "person": ["first_name", "social_channels"] }
                },
                "tables": [
                    {
                        "table_id": "tblPeople",
                        "name": "People",
                        "content_type": "person",
                        "view": "viwMain",
                        "fields": [
                            { "field_id": "fldTitle", "field_type": "text",
                              "destination": "core_attribute", "key": "title" },
                            { "field_id": "fldDept", "field_type": "multipleSelects",
                              "destination": "taxonomy_term", "key": "department" },
                            { "field_id": "fldLinkedIn", "field_type": "url",
                              "destination": "custom_field", "key": "social_channels",
                              "subfield": "social_link", "repeater_mode": "append",
                              "link_title": "LinkedIn" }
                        ]
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_sample_config() {
        let config = sample_config();
        assert_eq!(config.credentials.api_key, "key123");
        assert_eq!(config.tables.len(), 1);

        let table = &config.tables[0];
        assert_eq!(table.display_name(), "People");
        assert_eq!(table.view.as_deref(), Some("viwMain"));
        assert_eq!(table.fields.len(), 3);

        let link_rule = &table.fields[2];
        assert_eq!(link_rule.field_type, FieldType::Url);
        assert_eq!(link_rule.destination, DestinationKind::CustomField);
        assert_eq!(link_rule.repeater_mode, Some(RepeaterMode::Append));
        assert_eq!(link_rule.subfield.as_deref(), Some("social_link"));
    }

    #[test]
    fn test_parse_minimal_rule_defaults() {
        let rule: FieldRule =
            serde_json::from_str(r#"{ "field_id": "fldA", "key": "title" }"#).unwrap();
        assert_eq!(rule.field_type, FieldType::Text);
        assert_eq!(rule.destination, DestinationKind::CoreAttribute);
        assert!(rule.subfield.is_none());
    }

    #[test]
    fn test_unknown_field_type_falls_back_to_text() {
        let rule: FieldRule =
            serde_json::from_str(r#"{ "field_id": "fldA", "field_type": "aiText", "key": "x" }"#)
                .unwrap();
        assert_eq!(rule.field_type, FieldType::Text);
    }

    #[test]
    fn test_unknown_destination_is_rejected() {
        let result: std::result::Result<FieldRule, _> =
            serde_json::from_str(r#"{ "field_id": "fldA", "destination": "meta", "key": "x" }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_credentials_debug_redacts() {
        let credentials = Credentials {
            api_key: "secret-key".to_string(),
            base_id: "appSECRET".to_string(),
        };
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("secret-key"));
        assert!(!rendered.contains("appSECRET"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_validate_accepts_sample() {
        let config = sample_config();
        config.validate(&config.content_model).unwrap();
    }

    #[test]
    fn test_validate_missing_credentials() {
        let mut config = sample_config();
        config.credentials.api_key.clear();
        let err = config.validate(&config.content_model).unwrap_err();
        match err {
            Error::Validation { errors } => {
                assert!(errors.iter().any(|e| e.contains("api_key")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_duplicate_table_id() {
        let mut config = sample_config();
        let duplicate = config.tables[0].clone();
        config.tables.push(duplicate);
        let err = config.validate(&config.content_model).unwrap_err();
        match err {
            Error::Validation { errors } => {
                assert!(errors.iter().any(|e| e.contains("duplicate table_id")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_unregistered_references() {
        let mut config = sample_config();
        config.tables[0].content_type = "event".to_string();
        config.tables[0].fields[1].key = "region".to_string();
        let err = config.validate(&config.content_model).unwrap_err();
        match err {
            Error::Validation { errors } => {
                assert!(errors.iter().any(|e| e.contains("content type \"event\"")));
                assert!(errors.iter().any(|e| e.contains("taxonomy \"region\"")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_skips_registry_checks_when_empty() {
        let mut config = sample_config();
        config.content_model = ContentModel::default();
        // Unregistered names are fine when nothing is registered yet.
        config.tables[0].content_type = "event".to_string();
        config.validate(&config.content_model).unwrap();
    }

    #[test]
    fn test_validate_link_property_placement() {
        let mut config = sample_config();
        config.tables[0].fields[0].link_property = Some("url".to_string());
        let err = config.validate(&config.content_model).unwrap_err();
        match err {
            Error::Validation { errors } => {
                assert!(errors.iter().any(|e| e.contains("link_property")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_missing_rule_keys() {
        let mut config = sample_config();
        config.tables[0].fields.push(FieldRule::default());
        let err = config.validate(&config.content_model).unwrap_err();
        match err {
            Error::Validation { errors } => {
                assert!(errors.iter().any(|e| e.contains("field_id is missing")));
                assert!(errors.iter().any(|e| e.contains("key is missing")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_mapping_for_table() {
        let config = sample_config();
        assert!(config.mapping_for_table("tblPeople").is_some());
        assert!(config.mapping_for_table("tblNope").is_none());
    }

    #[test]
    fn test_resolve_config_path_explicit() {
        let explicit = PathBuf::from("/custom/mapping.json");
        assert_eq!(resolve_config_path(Some(&explicit)), explicit);
    }

    #[test]
    fn test_resolve_db_path_sits_beside_config() {
        let db = resolve_db_path(None, Path::new("/etc/airsync/airsync.json"));
        assert_eq!(db, PathBuf::from("/etc/airsync/airsync.db"));

        let db = resolve_db_path(None, Path::new("airsync.json"));
        assert_eq!(db, PathBuf::from("airsync.db"));
    }

    #[test]
    fn test_resolve_db_path_explicit_wins() {
        let explicit = PathBuf::from("/data/sync.db");
        assert_eq!(
            resolve_db_path(Some(&explicit), Path::new("/etc/airsync.json")),
            explicit
        );
    }
}
