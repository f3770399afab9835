//! Airtable REST API client.
//!
//! Thin I/O layer: paginated record listing, single-record fetch, and
//! attachment download. No sync logic lives here; responses are
//! normalized into [`Record`] values and typed errors and handed to the
//! engine.

use std::io::Write;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::airtable::types::{api_error_message, Record, RecordPage};
use crate::airtable::{AirtableError, AirtableResult, Attachment};
use crate::config::Credentials;

/// Production API endpoint.
pub const API_BASE_URL: &str = "https://api.airtable.com/v0";

/// Per-request timeout; an exceeded timeout surfaces as a transport error.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extension used when neither the declared MIME type nor the downloaded
/// bytes identify the attachment.
const DEFAULT_IMAGE_EXTENSION: &str = "jpg";

/// Source-side operations the sync engine depends on.
///
/// Implemented by [`AirtableClient`]; engine tests substitute fixture
/// sources.
pub trait RecordSource: Send + Sync {
    /// Fetch every record of a table (optionally scoped to a saved view),
    /// following the offset cursor until exhausted. Page order is
    /// preserved; a failure on any page fails the whole fetch.
    fn fetch_all_records(
        &self,
        table_id: &str,
        view: Option<&str>,
    ) -> impl std::future::Future<Output = AirtableResult<Vec<Record>>> + Send;

    /// Download an attachment into a temporary file.
    fn download_attachment(
        &self,
        attachment: &Attachment,
    ) -> impl std::future::Future<Output = AirtableResult<FetchedAttachment>> + Send;
}

/// A downloaded attachment staged in a temporary file.
///
/// The file is deleted when this value drops, so neither the success nor
/// the failure path can leave a stray temp file behind.
#[derive(Debug)]
pub struct FetchedAttachment {
    pub file: NamedTempFile,
    /// Final filename including an extension.
    pub filename: String,
    /// Declared MIME type, if the source provided one.
    pub mime: Option<String>,
}

/// Airtable REST API client.
pub struct AirtableClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    base_id: String,
}

impl AirtableClient {
    /// Create a client for the production endpoint.
    #[must_use]
    pub fn new(credentials: &Credentials) -> Self {
        Self::with_base_url(credentials, API_BASE_URL)
    }

    /// Create a client against a custom endpoint (stub servers in tests).
    #[must_use]
    pub fn with_base_url(credentials: &Credentials, base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: credentials.api_key.clone(),
            base_id: credentials.base_id.clone(),
        }
    }

    /// Fetch a single record by id.
    ///
    /// # Errors
    ///
    /// `Transport` on network failure, `Api` on a non-2xx response.
    pub async fn fetch_record(&self, table_id: &str, record_id: &str) -> AirtableResult<Record> {
        let url = format!("{}/{}/{}/{}", self.base_url, self.base_id, table_id, record_id);
        self.get_json(&url, &[("returnFieldsByFieldId", "true")]).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> AirtableResult<T> {
        let response = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AirtableError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AirtableError::Transport(e.without_url().to_string()))
    }
}

impl RecordSource for AirtableClient {
    async fn fetch_all_records(
        &self,
        table_id: &str,
        view: Option<&str>,
    ) -> AirtableResult<Vec<Record>> {
        let url = format!("{}/{}/{}", self.base_url, self.base_id, table_id);
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> = vec![("returnFieldsByFieldId", "true")];
            if let Some(view) = view {
                query.push(("view", view));
            }
            if let Some(ref token) = offset {
                query.push(("offset", token));
            }

            let page: RecordPage = self.get_json(&url, &query).await?;
            tracing::debug!(
                table_id,
                page_records = page.records.len(),
                has_more = page.offset.is_some(),
                "fetched record page"
            );
            records.extend(page.records);

            // A blank continuation token counts as exhausted.
            match page.offset {
                Some(next) if !next.is_empty() => offset = Some(next),
                _ => break,
            }
        }

        Ok(records)
    }

    async fn download_attachment(
        &self,
        attachment: &Attachment,
    ) -> AirtableResult<FetchedAttachment> {
        let url = attachment
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(AirtableError::InvalidAttachment)?;

        // Attachment URLs are expiring unauthenticated links; no bearer token.
        let response = self
            .http
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AirtableError::Download(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AirtableError::Download(format!("HTTP {}", status.as_u16())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AirtableError::Download(e.without_url().to_string()))?;

        let mut file =
            NamedTempFile::new().map_err(|e| AirtableError::Download(e.to_string()))?;
        file.write_all(&bytes)
            .map_err(|e| AirtableError::Download(e.to_string()))?;
        file.flush()
            .map_err(|e| AirtableError::Download(e.to_string()))?;

        let filename = resolve_filename(attachment, url, &bytes);
        Ok(FetchedAttachment {
            file,
            filename,
            mime: attachment.mime.clone(),
        })
    }
}

/// Final filename for a downloaded attachment.
///
/// Prefers the source-provided filename, falling back to the URL's last
/// path segment. When the name has no extension, one is inferred from
/// the declared MIME type, then from the downloaded bytes, then the
/// default image extension.
fn resolve_filename(attachment: &Attachment, url: &str, bytes: &[u8]) -> String {
    let base = attachment
        .filename
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| filename_from_url(url));

    if std::path::Path::new(&base).extension().is_some() {
        return base;
    }

    let ext = attachment
        .mime
        .as_deref()
        .and_then(extension_for_mime)
        .or_else(|| sniff_extension(bytes))
        .unwrap_or(DEFAULT_IMAGE_EXTENSION);
    format!("{base}.{ext}")
}

/// Last path segment of a URL, without query or fragment.
fn filename_from_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);

    without_query
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
        .map_or_else(|| "attachment".to_string(), ToString::to_string)
}

/// Extension for a declared MIME type, ignoring parameters.
fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        "application/pdf" => Some("pdf"),
        _ => None,
    }
}

/// Extension inferred from magic bytes.
fn sniff_extension(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("png")
    } else if bytes.starts_with(b"GIF8") {
        Some("gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else if bytes.starts_with(b"%PDF") {
        Some("pdf")
    } else {
        None
    }
}
