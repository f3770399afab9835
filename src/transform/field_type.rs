//! Source field types.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Declared type of a source field.
///
/// A closed set: the transformer matches every variant explicitly, so
/// adding one is a compile-checked change. Wire strings outside the set
/// deserialize to [`FieldType::Text`]: the source model treats anything
/// unrecognized as plain text rather than dropping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldType {
    Attachment,
    MultipleAttachments,
    Url,
    Email,
    Checkbox,
    MultipleSelects,
    MultipleLookupValues,
    Number,
    Currency,
    Percent,
    Duration,
    Date,
    DateTime,
    #[default]
    Text,
}

impl FieldType {
    /// Every variant, in declaration order.
    pub const ALL: [Self; 14] = [
        Self::Attachment,
        Self::MultipleAttachments,
        Self::Url,
        Self::Email,
        Self::Checkbox,
        Self::MultipleSelects,
        Self::MultipleLookupValues,
        Self::Number,
        Self::Currency,
        Self::Percent,
        Self::Duration,
        Self::Date,
        Self::DateTime,
        Self::Text,
    ];

    /// Parse a wire-format type name; unrecognized names become `Text`.
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "attachment" => Self::Attachment,
            "multipleAttachments" => Self::MultipleAttachments,
            "url" => Self::Url,
            "email" => Self::Email,
            "checkbox" => Self::Checkbox,
            "multipleSelects" => Self::MultipleSelects,
            "multipleLookupValues" => Self::MultipleLookupValues,
            "number" => Self::Number,
            "currency" => Self::Currency,
            "percent" => Self::Percent,
            "duration" => Self::Duration,
            "date" => Self::Date,
            "dateTime" => Self::DateTime,
            _ => Self::Text,
        }
    }

    /// Wire-format type name.
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Attachment => "attachment",
            Self::MultipleAttachments => "multipleAttachments",
            Self::Url => "url",
            Self::Email => "email",
            Self::Checkbox => "checkbox",
            Self::MultipleSelects => "multipleSelects",
            Self::MultipleLookupValues => "multipleLookupValues",
            Self::Number => "number",
            Self::Currency => "currency",
            Self::Percent => "percent",
            Self::Duration => "duration",
            Self::Date => "date",
            Self::DateTime => "dateTime",
            Self::Text => "text",
        }
    }

    /// Whether values of this type are binary attachments.
    #[must_use]
    pub const fn is_attachment(self) -> bool {
        matches!(self, Self::Attachment | Self::MultipleAttachments)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_round_trip() {
        for variant in FieldType::ALL {
            assert_eq!(FieldType::from_wire(variant.as_wire()), variant);
        }
    }

    #[test]
    fn test_unknown_wire_names_become_text() {
        assert_eq!(FieldType::from_wire("singleLineText"), FieldType::Text);
        assert_eq!(FieldType::from_wire("richText"), FieldType::Text);
        assert_eq!(FieldType::from_wire("formula"), FieldType::Text);
        assert_eq!(FieldType::from_wire(""), FieldType::Text);
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let parsed: FieldType = serde_json::from_str("\"multipleSelects\"").unwrap();
        assert_eq!(parsed, FieldType::MultipleSelects);
        assert_eq!(
            serde_json::to_string(&FieldType::DateTime).unwrap(),
            "\"dateTime\""
        );
    }

    #[test]
    fn test_is_attachment() {
        assert!(FieldType::Attachment.is_attachment());
        assert!(FieldType::MultipleAttachments.is_attachment());
        assert!(!FieldType::Url.is_attachment());
    }
}
