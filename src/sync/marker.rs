//! Modification-marker detection.

use serde_json::{Map, Value};

/// Find a record's modification marker: the first field value, in field
/// order, shaped like an ISO-8601 timestamp.
///
/// The source model has no reserved "last modified" field name, so this
/// is a first-match heuristic over the record's own field order. It
/// lives behind this one function so an explicitly configured field id
/// could replace it later without touching the engine.
#[must_use]
pub fn modification_marker(fields: &Map<String, Value>) -> Option<&str> {
    fields.values().find_map(|value| {
        let text = value.as_str()?;
        looks_like_timestamp(text).then_some(text)
    })
}

/// Prefix-matches `^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}` and validates
/// the matched prefix parses as a real datetime.
fn looks_like_timestamp(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.len() < 19 {
        return false;
    }

    const DIGITS: [usize; 14] = [0, 1, 2, 3, 5, 6, 8, 9, 11, 12, 14, 15, 17, 18];
    const SEPARATORS: [(usize, u8); 5] = [(4, b'-'), (7, b'-'), (10, b'T'), (13, b':'), (16, b':')];

    if !DIGITS.iter().all(|&i| bytes[i].is_ascii_digit()) {
        return false;
    }
    if !SEPARATORS.iter().all(|&(i, c)| bytes[i] == c) {
        return false;
    }

    // Prefix is all ASCII, so the slice sits on a char boundary.
    chrono::NaiveDateTime::parse_from_str(&text[..19], "%Y-%m-%dT%H:%M:%S").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_detects_iso_timestamp() {
        let fields = fields(&[
            ("fldName", json!("Ada Lovelace")),
            ("fldModified", json!("2024-03-05T10:20:30.000Z")),
        ]);
        assert_eq!(
            modification_marker(&fields),
            Some("2024-03-05T10:20:30.000Z")
        );
    }

    #[test]
    fn test_first_match_wins_in_field_order() {
        let fields = fields(&[
            ("fldCreated", json!("2023-01-01T00:00:00.000Z")),
            ("fldModified", json!("2024-03-05T10:20:30.000Z")),
        ]);
        // Heuristic, not semantics: the earlier field is the marker.
        assert_eq!(
            modification_marker(&fields),
            Some("2023-01-01T00:00:00.000Z")
        );
    }

    #[test]
    fn test_none_when_no_timestamp_shaped_value() {
        let fields = fields(&[
            ("fldName", json!("Ada")),
            ("fldDate", json!("2024-03-05")),
            ("fldCount", json!(42)),
            ("fldFlag", json!(true)),
        ]);
        assert_eq!(modification_marker(&fields), None);
    }

    #[test]
    fn test_rejects_shape_without_valid_datetime() {
        let fields = fields(&[("fldBad", json!("2024-13-45T99:99:99.000Z"))]);
        assert_eq!(modification_marker(&fields), None);
    }

    #[test]
    fn test_marker_keeps_full_string() {
        let fields = fields(&[("fldModified", json!("2024-03-05T10:20:30+02:00"))]);
        assert_eq!(modification_marker(&fields), Some("2024-03-05T10:20:30+02:00"));
    }

    #[test]
    fn test_non_string_values_ignored() {
        let fields = fields(&[
            ("fldList", json!(["2024-03-05T10:20:30.000Z"])),
            ("fldReal", json!("2024-03-05T10:20:30.000Z")),
        ]);
        assert_eq!(
            modification_marker(&fields),
            Some("2024-03-05T10:20:30.000Z")
        );
    }
}
