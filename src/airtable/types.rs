//! Wire types for the Airtable REST API.

use serde::Deserialize;
use serde_json::{Map, Value};

/// One record as returned by the list/get endpoints.
///
/// Field keys are stable field ids (`fld...`), never display names;
/// every request sets `returnFieldsByFieldId=true` so that source-side
/// column renames cannot break a mapping. Raw values stay dynamically
/// typed; the transformer shapes them per mapping rule.
#[derive(Debug, Clone, Deserialize)]
pub struct Record {
    /// Stable record id (`rec...`), stored on destination items as the
    /// external id.
    pub id: String,
    /// Field id → raw value, in API response order.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Raw value of a field by field id.
    #[must_use]
    pub fn field(&self, field_id: &str) -> Option<&Value> {
        self.fields.get(field_id)
    }
}

/// One page of the list-records endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct RecordPage {
    #[serde(default)]
    pub records: Vec<Record>,
    /// Cursor for the next page; absent on the last page.
    pub offset: Option<String>,
}

/// One attachment object inside an attachment-typed field value.
///
/// Airtable serves attachments from expiring unauthenticated URLs, so
/// downloads must happen within the same pass that fetched the record.
#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    /// Declared MIME type, e.g. `image/jpeg`.
    #[serde(default, rename = "type")]
    pub mime: Option<String>,
}

/// Error envelope the API returns on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Extract the human-readable message from an API error body.
///
/// Falls back to a fixed string when the body is not the documented
/// envelope (HTML error pages, empty bodies).
pub(crate) fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or_else(|| "Unknown error".to_string())
}
