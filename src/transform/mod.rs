//! Field transformation.
//!
//! Maps `(raw source value, declared field type, mapping rule)` onto the
//! destination-shaped `serde_json::Value` the store accepts. Every arm is
//! a synchronous pure function except attachment import, which downloads
//! through the source client and lands in the asset store.
//!
//! The empty-value law: `null` and `""` always produce the
//! type-appropriate empty value, meaning `false` for checkboxes, `0` for
//! numerics, `[]` for multi-value and attachment types, `[]` whenever the
//! rule targets a repeater subfield, `""` otherwise.

mod field_type;
mod sanitize;

pub use field_type::FieldType;
pub use sanitize::{sanitize_email, sanitize_line, sanitize_text, sanitize_url};

use serde_json::{json, Map, Value};

use crate::airtable::{Attachment, RecordSource};
use crate::config::FieldRule;
use crate::store::AssetStore;

/// Normalized form for date and datetime values.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Transform one field value, pure arms only.
///
/// Attachment-typed values come back as an empty list here; the sync
/// path resolves them through [`transform_field`] instead, which is the
/// only arm that touches the network or the asset store.
#[must_use]
pub fn transform(raw: &Value, field_type: FieldType, rule: &FieldRule) -> Value {
    if is_empty_raw(raw) {
        return empty_value(field_type, rule);
    }

    if rule.subfield.is_some() {
        return repeater_row(raw, field_type, rule);
    }

    match field_type {
        FieldType::Attachment | FieldType::MultipleAttachments => json!([]),
        FieldType::Url => json!(sanitize_url(&coerce_text(raw))),
        FieldType::Email => json!(sanitize_email(&coerce_text(raw))),
        FieldType::Checkbox => json!(truthy(raw)),
        FieldType::MultipleSelects | FieldType::MultipleLookupValues => transform_multiple(raw),
        FieldType::Number | FieldType::Currency | FieldType::Percent | FieldType::Duration => {
            transform_number(raw)
        }
        FieldType::Date | FieldType::DateTime => json!(normalize_date(&coerce_text(raw))),
        FieldType::Text => json!(sanitize_text(&coerce_text(raw))),
    }
}

/// Transform one field value, including the attachment arm.
///
/// A non-empty attachment value outside a repeater is downloaded and
/// imported; the result is the asset reference, or `null` when any part
/// of the pipeline fails (logged, never fatal to the record). All other
/// inputs delegate to [`transform`].
pub async fn transform_field<S, A>(
    raw: &Value,
    rule: &FieldRule,
    source: &S,
    assets: &mut A,
) -> Value
where
    S: RecordSource,
    A: AssetStore,
{
    if rule.field_type.is_attachment() && !is_empty_raw(raw) && rule.subfield.is_none() {
        return import_first_attachment(raw, rule, source, assets).await;
    }
    transform(raw, rule.field_type, rule)
}

/// Type-appropriate empty value per the empty-value law.
#[must_use]
pub fn empty_value(field_type: FieldType, rule: &FieldRule) -> Value {
    if rule.subfield.is_some() {
        return json!([]);
    }

    match field_type {
        FieldType::Checkbox => json!(false),
        FieldType::Number | FieldType::Currency | FieldType::Percent | FieldType::Duration => {
            json!(0)
        }
        FieldType::Attachment
        | FieldType::MultipleAttachments
        | FieldType::MultipleSelects
        | FieldType::MultipleLookupValues => json!([]),
        FieldType::Url
        | FieldType::Email
        | FieldType::Date
        | FieldType::DateTime
        | FieldType::Text => json!(""),
    }
}

/// Reformat a date-ish string to [`DATE_FORMAT`] in UTC.
///
/// Accepts RFC 3339 (the source's native form), bare
/// `YYYY-MM-DDTHH:MM:SS`, the normalized form itself, and bare dates.
/// Unparseable input yields an empty string.
#[must_use]
pub fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();

    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&chrono::Utc).format(DATE_FORMAT).to_string();
    }
    if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return parsed.format(DATE_FORMAT).to_string();
    }
    if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(raw, DATE_FORMAT) {
        return parsed.format(DATE_FORMAT).to_string();
    }
    if let Ok(parsed) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return format!("{} 00:00:00", parsed.format("%Y-%m-%d"));
    }

    String::new()
}

async fn import_first_attachment<S, A>(
    raw: &Value,
    rule: &FieldRule,
    source: &S,
    assets: &mut A,
) -> Value
where
    S: RecordSource,
    A: AssetStore,
{
    let Some(descriptor) = first_attachment(raw) else {
        tracing::warn!(field_id = %rule.field_id, "attachment value has no usable descriptor");
        return Value::Null;
    };

    let fetched = match source.download_attachment(&descriptor).await {
        Ok(fetched) => fetched,
        Err(e) => {
            tracing::warn!(field_id = %rule.field_id, "attachment download failed: {e}");
            return Value::Null;
        }
    };

    match assets.import(fetched.file.path(), &fetched.filename, fetched.mime.as_deref()) {
        Ok(asset) => json!(asset),
        Err(e) => {
            tracing::warn!(field_id = %rule.field_id, "attachment import failed: {e}");
            Value::Null
        }
    }
}

/// First attachment descriptor in the value, whether the value is a list
/// of attachments or a single one.
fn first_attachment(raw: &Value) -> Option<Attachment> {
    let candidate = match raw {
        Value::Array(items) => items.first()?,
        Value::Object(_) => raw,
        _ => return None,
    };
    serde_json::from_value(candidate.clone()).ok()
}

/// One repeater row: `[{subfield: value}]`. Merging rows across rules is
/// the engine's job; this never returns more than one.
fn repeater_row(raw: &Value, field_type: FieldType, rule: &FieldRule) -> Value {
    let row_value = match field_type {
        FieldType::Url => link_value(raw, rule),
        FieldType::Attachment
        | FieldType::MultipleAttachments
        | FieldType::Email
        | FieldType::Checkbox
        | FieldType::MultipleSelects
        | FieldType::MultipleLookupValues
        | FieldType::Number
        | FieldType::Currency
        | FieldType::Percent
        | FieldType::Duration
        | FieldType::Date
        | FieldType::DateTime
        | FieldType::Text => json!(sanitize_line(&coerce_text(raw))),
    };

    let mut row = Map::new();
    row.insert(
        rule.subfield.clone().unwrap_or_default(),
        row_value,
    );
    Value::Array(vec![Value::Object(row)])
}

/// Structured link form for url fields: `{url, title, target}` with the
/// rule's static `link_title` (empty when unset) and an empty `target`.
fn link_value(raw: &Value, rule: &FieldRule) -> Value {
    json!({
        "url": sanitize_url(&coerce_text(raw)),
        "title": rule.link_title.clone().unwrap_or_default(),
        "target": "",
    })
}

fn transform_multiple(raw: &Value) -> Value {
    let Value::Array(items) = raw else {
        return json!([]);
    };

    let values: Vec<Value> = items
        .iter()
        .map(|item| json!(sanitize_line(&coerce_text(item))))
        .collect();
    Value::Array(values)
}

/// Integer when the textual form has no decimal point, else float;
/// non-numeric input yields `0`. Wire-typed numbers pass through.
fn transform_number(raw: &Value) -> Value {
    match raw {
        Value::Number(_) => raw.clone(),
        Value::String(s) => {
            let s = s.trim();
            if s.contains('.') {
                s.parse::<f64>().map_or_else(|_| json!(0), |f| json!(f))
            } else if let Ok(i) = s.parse::<i64>() {
                json!(i)
            } else if let Ok(f) = s.parse::<f64>() {
                // Exponent forms without a decimal point.
                json!(f)
            } else {
                json!(0)
            }
        }
        _ => json!(0),
    }
}

/// JSON truthiness. Never parses string contents: any non-empty string
/// is true.
fn truthy(raw: &Value) -> bool {
    match raw {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Best-effort text form of a scalar; containers coerce to empty.
fn coerce_text(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn is_empty_raw(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> FieldRule {
        FieldRule {
            field_id: "fldTest".to_string(),
            key: "test".to_string(),
            ..FieldRule::default()
        }
    }

    fn repeater_rule(subfield: &str) -> FieldRule {
        FieldRule {
            subfield: Some(subfield.to_string()),
            ..rule()
        }
    }

    #[test]
    fn test_empty_value_law_all_types() {
        for field_type in FieldType::ALL {
            let expected = match field_type {
                FieldType::Checkbox => json!(false),
                FieldType::Number
                | FieldType::Currency
                | FieldType::Percent
                | FieldType::Duration => json!(0),
                FieldType::Attachment
                | FieldType::MultipleAttachments
                | FieldType::MultipleSelects
                | FieldType::MultipleLookupValues => json!([]),
                _ => json!(""),
            };
            assert_eq!(transform(&Value::Null, field_type, &rule()), expected);
            assert_eq!(transform(&json!(""), field_type, &rule()), expected);

            // With a subfield set the empty value is always an empty row list.
            assert_eq!(
                transform(&Value::Null, field_type, &repeater_rule("sub")),
                json!([])
            );
        }
    }

    #[test]
    fn test_text_strips_markup_keeps_breaks() {
        let out = transform(&json!("<p>first</p>\nsecond"), FieldType::Text, &rule());
        assert_eq!(out, json!("first\nsecond"));
    }

    #[test]
    fn test_unknown_type_parses_as_text() {
        let field_type = FieldType::from_wire("barcode");
        let out = transform(&json!("<i>plain</i>"), field_type, &rule());
        assert_eq!(out, json!("plain"));
    }

    #[test]
    fn test_url_plain() {
        let out = transform(&json!("https://example.com"), FieldType::Url, &rule());
        assert_eq!(out, json!("https://example.com"));
    }

    #[test]
    fn test_url_in_repeater_builds_link() {
        let mapping = FieldRule {
            field_type: FieldType::Url,
            link_title: Some("LinkedIn".to_string()),
            ..repeater_rule("social_link")
        };
        let out = transform(&json!("https://linkedin.com/in/ada"), FieldType::Url, &mapping);

        assert_eq!(
            out,
            json!([{
                "social_link": {
                    "url": "https://linkedin.com/in/ada",
                    "title": "LinkedIn",
                    "target": "",
                }
            }])
        );
    }

    #[test]
    fn test_url_in_repeater_without_title() {
        let mapping = FieldRule {
            field_type: FieldType::Url,
            ..repeater_rule("social_link")
        };
        let out = transform(&json!("https://example.com"), FieldType::Url, &mapping);
        assert_eq!(out[0]["social_link"]["title"], json!(""));
    }

    #[test]
    fn test_repeater_text_row_is_single_line() {
        let out = transform(
            &json!("line one\nline two"),
            FieldType::Text,
            &repeater_rule("note"),
        );
        assert_eq!(out, json!([{ "note": "line one line two" }]));
    }

    #[test]
    fn test_email() {
        assert_eq!(
            transform(&json!("ada@example.com"), FieldType::Email, &rule()),
            json!("ada@example.com")
        );
        assert_eq!(
            transform(&json!("not an email"), FieldType::Email, &rule()),
            json!("")
        );
    }

    #[test]
    fn test_checkbox_truthiness() {
        assert_eq!(transform(&json!(true), FieldType::Checkbox, &rule()), json!(true));
        assert_eq!(transform(&json!(false), FieldType::Checkbox, &rule()), json!(false));
        assert_eq!(transform(&json!(1), FieldType::Checkbox, &rule()), json!(true));
        assert_eq!(transform(&json!(0), FieldType::Checkbox, &rule()), json!(false));
        // Strings are presence-checked, never parsed.
        assert_eq!(transform(&json!("checked"), FieldType::Checkbox, &rule()), json!(true));
    }

    #[test]
    fn test_multiple_values_sanitized() {
        let out = transform(
            &json!(["Engineering", "<b>Design</b>", 7]),
            FieldType::MultipleSelects,
            &rule(),
        );
        assert_eq!(out, json!(["Engineering", "Design", "7"]));

        let out = transform(&json!("not-a-list"), FieldType::MultipleLookupValues, &rule());
        assert_eq!(out, json!([]));
    }

    #[test]
    fn test_number_int_vs_float() {
        assert_eq!(transform(&json!(42), FieldType::Number, &rule()), json!(42));
        assert_eq!(transform(&json!(4.5), FieldType::Currency, &rule()), json!(4.5));
        assert_eq!(transform(&json!("42"), FieldType::Number, &rule()), json!(42));
        assert_eq!(transform(&json!("4.5"), FieldType::Percent, &rule()), json!(4.5));
        assert_eq!(transform(&json!("forty"), FieldType::Duration, &rule()), json!(0));
    }

    #[test]
    fn test_date_normalization() {
        assert_eq!(
            transform(&json!("2024-03-05T10:20:30.000Z"), FieldType::DateTime, &rule()),
            json!("2024-03-05 10:20:30")
        );
        assert_eq!(
            transform(&json!("2024-03-05"), FieldType::Date, &rule()),
            json!("2024-03-05 00:00:00")
        );
        assert_eq!(
            transform(&json!("2024-03-05T12:00:00+02:00"), FieldType::DateTime, &rule()),
            json!("2024-03-05 10:00:00")
        );
        assert_eq!(transform(&json!("whenever"), FieldType::Date, &rule()), json!(""));
    }

    #[test]
    fn test_attachment_pure_arm_is_empty_list() {
        let out = transform(
            &json!([{ "url": "https://files.example/x.jpg" }]),
            FieldType::MultipleAttachments,
            &rule(),
        );
        assert_eq!(out, json!([]));
    }

    #[test]
    fn test_first_attachment_shapes() {
        let list = json!([{ "url": "https://a/x.png", "filename": "x.png" }, { "url": "https://a/y.png" }]);
        let first = first_attachment(&list).unwrap();
        assert_eq!(first.url.as_deref(), Some("https://a/x.png"));

        let single = json!({ "url": "https://a/z.png" });
        assert!(first_attachment(&single).is_some());

        assert!(first_attachment(&json!("https://a/x.png")).is_none());
        assert!(first_attachment(&json!([])).is_none());
    }

    #[test]
    fn test_grouping_idempotence_of_transform() {
        // Same input, same rule, twice: byte-identical output.
        let mapping = FieldRule {
            field_type: FieldType::Url,
            link_title: Some("Site".to_string()),
            ..repeater_rule("link")
        };
        let raw = json!("https://example.com");
        let first = transform(&raw, FieldType::Url, &mapping);
        let second = transform(&raw, FieldType::Url, &mapping);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
