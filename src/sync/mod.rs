//! One-way synchronization from source tables to the destination store.
//!
//! A sync pass is fetch → per-record upsert → orphan reconciliation,
//! driven by [`SyncEngine`] and reported through [`SyncStats`]. Change
//! detection rides on the modification marker ([`modification_marker`]);
//! records whose marker matches the stored one are skipped wholesale.

mod engine;
mod marker;
mod stats;

pub use engine::{RecordAction, SyncEngine, FEATURED_ASSET_KEY};
pub use marker::modification_marker;
pub use stats::SyncStats;
