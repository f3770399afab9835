//! Airsync - one-way Airtable to content-store synchronization
//!
//! This crate provides the core functionality for the `airsync` CLI.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Mapping configuration (credentials, content model, tables)
//! - [`airtable`] - Source API client and wire types
//! - [`transform`] - Field value transformation and sanitization
//! - [`store`] - Destination content and asset storage (SQLite)
//! - [`sync`] - The reconciliation engine
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod airtable;
pub mod cli;
pub mod config;
pub mod error;
pub mod store;
pub mod sync;
pub mod transform;

pub use error::{Error, Result};
