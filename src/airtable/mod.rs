//! Airtable API boundary: wire types, client, and source-side errors.

mod client;
mod types;

pub use client::{AirtableClient, FetchedAttachment, RecordSource, API_BASE_URL};
pub use types::{Attachment, Record};

use thiserror::Error;

/// Errors surfaced by the Airtable boundary.
///
/// `Transport` and `Api` abort a fetch outright; the attachment variants
/// are non-fatal to the record that contains them.
#[derive(Error, Debug)]
pub enum AirtableError {
    /// Network-level failure (DNS, TLS, timeout). Retryable by
    /// re-running the pass.
    #[error("request failed: {0}")]
    Transport(String),

    /// The API rejected the request; `message` is surfaced verbatim.
    #[error("API responded {status}: {message}")]
    Api { status: u16, message: String },

    /// Attachment value carried no URL.
    #[error("attachment has no url")]
    InvalidAttachment,

    /// Attachment transfer or staging failed.
    #[error("attachment download failed: {0}")]
    Download(String),
}

/// Result type for Airtable boundary operations.
pub type AirtableResult<T> = std::result::Result<T, AirtableError>;

impl From<reqwest::Error> for AirtableError {
    fn from(e: reqwest::Error) -> Self {
        // The default display embeds the request URL, and record URLs
        // contain the base id; strip it before the message can reach a log.
        Self::Transport(e.without_url().to_string())
    }
}
