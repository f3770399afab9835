//! The reconciliation engine: one-way passes from source tables into
//! the destination store.
//!
//! One pass per table mapping: fetch every record, upsert each one by
//! its external id, then draft published items that no longer appear in
//! the source. A fetch failure aborts the pass before any write;
//! per-record failures are counted and the pass continues.

use std::collections::HashSet;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::airtable::{Record, RecordSource};
use crate::config::{DestinationKind, TableMapping};
use crate::error::Result;
use crate::store::{
    AssetRef, AssetStore, ContentStatus, ContentStore, META_EXTERNAL_ID, META_LAST_MODIFIED,
    META_LAST_SYNCED,
};
use crate::sync::marker::modification_marker;
use crate::sync::stats::SyncStats;
use crate::transform::{transform_field, DATE_FORMAT};

/// Core destination key diverted to the featured-asset slot instead of
/// the generic attribute bucket.
pub const FEATURED_ASSET_KEY: &str = "featured_asset";

/// Outcome of syncing a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAction {
    Created,
    Updated,
    Skipped,
}

impl RecordAction {
    const fn as_past_tense(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Skipped => "skipped",
        }
    }
}

/// A record's transformed values, grouped by destination.
#[derive(Debug, Default)]
struct GroupedFields {
    core: Map<String, Value>,
    custom: Map<String, Value>,
    /// Taxonomy → accumulated terms, in first-seen rule order.
    taxonomies: Vec<(String, Vec<String>)>,
    featured_asset: Option<AssetRef>,
}

impl GroupedFields {
    /// Terms bucket for a taxonomy, created on first use.
    fn taxonomy_entry(&mut self, taxonomy: &str) -> &mut Vec<String> {
        let idx = match self.taxonomies.iter().position(|(t, _)| t == taxonomy) {
            Some(idx) => idx,
            None => {
                self.taxonomies.push((taxonomy.to_string(), Vec::new()));
                self.taxonomies.len() - 1
            }
        };
        &mut self.taxonomies[idx].1
    }
}

/// Drives full table passes against the destination store.
///
/// Generic over the record source and the store so passes can run
/// against fixtures and an in-memory database. Strictly sequential: one
/// record is fully applied before the next is looked at.
pub struct SyncEngine<S, St> {
    source: S,
    store: St,
    dry_run: bool,
}

impl<S, St> SyncEngine<S, St>
where
    S: RecordSource,
    St: ContentStore + AssetStore,
{
    #[must_use]
    pub fn new(source: S, store: St, dry_run: bool) -> Self {
        Self {
            source,
            store,
            dry_run,
        }
    }

    /// Read access to the underlying store.
    #[must_use]
    pub fn store(&self) -> &St {
        &self.store
    }

    /// Run one full pass over a table mapping.
    ///
    /// # Errors
    ///
    /// Returns an error only when the fetch itself fails; every
    /// later failure is absorbed into the returned statistics.
    pub async fn sync_table(&mut self, mapping: &TableMapping) -> Result<SyncStats> {
        let records = match self
            .source
            .fetch_all_records(&mapping.table_id, mapping.view.as_deref())
            .await
        {
            Ok(records) => records,
            Err(e) => {
                error!("failed to fetch records for {}: {e}", mapping.display_name());
                return Err(e.into());
            }
        };

        info!(
            "found {} records to sync for {}",
            records.len(),
            mapping.display_name()
        );

        let mut stats = SyncStats::default();
        let mut synced_ids: HashSet<String> = HashSet::with_capacity(records.len());

        for record in &records {
            stats.processed += 1;
            // Collected before the attempt: a record that errors mid-write
            // still belongs to the source set and must not be drafted as
            // an orphan afterwards.
            synced_ids.insert(record.id.clone());

            match self.sync_record(record, mapping).await {
                Ok(RecordAction::Created) => stats.created += 1,
                Ok(RecordAction::Updated) => stats.updated += 1,
                Ok(RecordAction::Skipped) => stats.skipped += 1,
                Err(e) => {
                    stats.errors += 1;
                    error!("failed to sync record {}: {e}", record.id);
                }
            }
        }

        self.reconcile_orphans(mapping, &synced_ids, &mut stats);
        Ok(stats)
    }

    /// Upsert one record, returning the action taken.
    async fn sync_record(
        &mut self,
        record: &Record,
        mapping: &TableMapping,
    ) -> Result<RecordAction> {
        let existing = self
            .store
            .find_by_external_id(&mapping.content_type, &record.id)?;
        let marker = modification_marker(&record.fields).map(str::to_string);

        // Skip only when the stored marker matches exactly; an item
        // without a marker, or a record without one, always writes.
        if let (Some(item), Some(marker)) = (&existing, &marker) {
            let stored = self.store.get_metadata(item.id, META_LAST_MODIFIED)?;
            if stored.as_deref() == Some(marker.as_str()) {
                info!("skipped item {} ({}) - no changes", item.id, record.id);
                return Ok(RecordAction::Skipped);
            }
        }

        if self.dry_run {
            return Ok(match existing {
                Some(item) => {
                    info!("would update item {} ({})", item.id, record.id);
                    RecordAction::Updated
                }
                None => {
                    info!("would create item ({})", record.id);
                    RecordAction::Created
                }
            });
        }

        let grouped = self.transform_record(record, mapping).await;

        let (item_id, action) = match existing {
            Some(item) => {
                self.store.update(item.id, &grouped.core)?;
                // Updates re-publish: a drafted orphan that reappears in
                // the source comes back as published.
                self.store.set_status(item.id, ContentStatus::Published)?;
                (item.id, RecordAction::Updated)
            }
            None => {
                let id = self.store.create(&mapping.content_type, &grouped.core)?;
                (id, RecordAction::Created)
            }
        };

        self.store.set_metadata(item_id, META_EXTERNAL_ID, &record.id)?;
        let now = Utc::now().format(DATE_FORMAT).to_string();
        self.store.set_metadata(item_id, META_LAST_SYNCED, &now)?;
        if let Some(marker) = &marker {
            self.store.set_metadata(item_id, META_LAST_MODIFIED, marker)?;
        }

        for (key, value) in &grouped.custom {
            self.store.set_custom_field(item_id, key, value)?;
        }
        for (taxonomy, terms) in &grouped.taxonomies {
            self.store.assign_taxonomy_terms(item_id, taxonomy, terms)?;
        }
        if let Some(asset) = grouped.featured_asset {
            self.store.assign_featured_asset(item_id, asset)?;
        }

        info!("{} item {item_id} ({})", action.as_past_tense(), record.id);
        Ok(action)
    }

    /// Transform every mapped field present on the record and group the
    /// results by destination, in rule declaration order.
    ///
    /// Rules whose source field is absent or null are skipped outright,
    /// leaving any previously stored destination value in place.
    async fn transform_record(&mut self, record: &Record, mapping: &TableMapping) -> GroupedFields {
        let mut grouped = GroupedFields::default();

        for rule in &mapping.fields {
            let Some(raw) = record.field(&rule.field_id) else {
                continue;
            };
            if raw.is_null() {
                continue;
            }

            let value = transform_field(raw, rule, &self.source, &mut self.store).await;

            match rule.destination {
                DestinationKind::CoreAttribute => {
                    if rule.key == FEATURED_ASSET_KEY {
                        // A failed import yields null; keep whatever an
                        // earlier rule grouped.
                        if let Some(asset) = value.as_i64() {
                            grouped.featured_asset = Some(asset);
                        }
                    } else {
                        grouped.core.insert(rule.key.clone(), value);
                    }
                }
                DestinationKind::TaxonomyTerm => {
                    let terms = grouped.taxonomy_entry(&rule.key);
                    match &value {
                        Value::Array(items) => {
                            terms.extend(items.iter().filter_map(term_text));
                        }
                        other => {
                            if let Some(term) = term_text(other) {
                                terms.push(term);
                            }
                        }
                    }
                }
                DestinationKind::CustomField => {
                    if let Some(property) = &rule.link_property {
                        // Lazily initialize the link shape, then set only
                        // the named property. Later rules fill in their
                        // own property without clearing earlier ones.
                        let entry = grouped
                            .custom
                            .entry(rule.key.clone())
                            .or_insert_with(empty_link);
                        if let Some(obj) = entry.as_object_mut() {
                            obj.insert(property.clone(), value);
                        }
                    } else if rule.subfield.is_some() {
                        // Repeater rows accumulate: every rule targeting
                        // the key appends its row in declaration order.
                        let entry = grouped
                            .custom
                            .entry(rule.key.clone())
                            .or_insert_with(|| Value::Array(Vec::new()));
                        if let (Some(rows), Value::Array(new_rows)) =
                            (entry.as_array_mut(), value)
                        {
                            rows.extend(new_rows);
                        }
                    } else {
                        grouped.custom.insert(rule.key.clone(), value);
                    }
                }
            }
        }

        grouped
    }

    /// Draft published items of this content type whose external id was
    /// not seen in the pass. Never deletes.
    fn reconcile_orphans(
        &mut self,
        mapping: &TableMapping,
        synced: &HashSet<String>,
        stats: &mut SyncStats,
    ) {
        let published = match self.store.list_published_with_external_id(&mapping.content_type) {
            Ok(ids) => ids,
            Err(e) => {
                stats.errors += 1;
                error!("failed to list published items for orphan check: {e}");
                return;
            }
        };
        if published.is_empty() {
            return;
        }

        info!(
            "checking {} published items for orphaned records",
            published.len()
        );

        for item_id in published {
            let external_id = match self.store.get_external_id(item_id) {
                Ok(Some(id)) => id,
                Ok(None) => continue,
                Err(e) => {
                    stats.errors += 1;
                    error!("failed to read external id of item {item_id}: {e}");
                    continue;
                }
            };
            if synced.contains(&external_id) {
                continue;
            }

            if self.dry_run {
                stats.unpublished += 1;
                info!("would unpublish item {item_id} ({external_id})");
                continue;
            }

            match self.store.set_status(item_id, ContentStatus::Draft) {
                Ok(()) => {
                    stats.unpublished += 1;
                    info!("unpublished item {item_id} ({external_id}) - no longer in source");
                }
                Err(e) => {
                    stats.errors += 1;
                    error!("failed to unpublish item {item_id}: {e}");
                }
            }
        }
    }
}

/// Empty composite link, the lazy-init value for `link_property` rules.
fn empty_link() -> Value {
    json!({ "url": "", "title": "", "target": "" })
}

/// A taxonomy term from a transformed value. Empty strings and
/// non-scalar values contribute nothing.
fn term_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
