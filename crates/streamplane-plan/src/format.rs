//! Key and value serialization format descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single serialization format, e.g. `JSON` or `KAFKA`.
///
/// Two formats are interchangeable only when identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatInfo {
    /// Format identifier.
    pub format: String,
}

impl FormatInfo {
    /// Creates a format descriptor.
    #[must_use]
    pub fn of(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }
}

impl fmt::Display for FormatInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format)
    }
}

/// Independent key and value formats of a source, sink, or state store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formats {
    /// Format of record keys.
    pub key_format: FormatInfo,
    /// Format of record values.
    pub value_format: FormatInfo,
}

impl Formats {
    /// Creates a key/value format pair.
    #[must_use]
    pub fn of(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key_format: FormatInfo::of(key),
            value_format: FormatInfo::of(value),
        }
    }
}

impl fmt::Display for Formats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.key_format, self.value_format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formats_wire_shape() {
        let formats = Formats::of("KAFKA", "JSON");
        let json = serde_json::to_string(&formats).unwrap();
        assert_eq!(
            json,
            r#"{"keyFormat":{"format":"KAFKA"},"valueFormat":{"format":"JSON"}}"#
        );
    }

    #[test]
    fn test_formats_ignore_unknown_fields() {
        let json = r#"{"keyFormat":{"format":"KAFKA","features":[]},"valueFormat":{"format":"AVRO"}}"#;
        let formats: Formats = serde_json::from_str(json).unwrap();
        assert_eq!(formats, Formats::of("KAFKA", "AVRO"));
        assert_eq!(formats.to_string(), "KAFKA/AVRO");
    }
}
