//! Static table of every `@type` tag this engine can decode.
//!
//! Decoding consults only this table to decide whether a tag is readable,
//! so the "unknown tags fail" rule lives in one place. Adding a node kind or
//! a new version of one means adding a variant to the model and a row here.

use std::fmt;

use crate::error::PlanError;
use crate::version::EngineVersion;

/// Where in a plan document a tag may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagCategory {
    /// Entries of the top-level `plan` array.
    PlanEntry,
    /// `ddlCommand` objects.
    DdlCommand,
    /// Physical plan nodes.
    PlanNode,
}

impl fmt::Display for TagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlanEntry => write!(f, "plan entry"),
            Self::DdlCommand => write!(f, "DDL command"),
            Self::PlanNode => write!(f, "plan node"),
        }
    }
}

/// A registered tag and the engine version that introduced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpec {
    /// Full tag, e.g. `tableSinkV1`.
    pub tag: &'static str,
    /// Where the tag may appear.
    pub category: TagCategory,
    /// First engine version that wrote this tag.
    pub since: EngineVersion,
}

impl TagSpec {
    const fn new(tag: &'static str, category: TagCategory, since: EngineVersion) -> Self {
        Self {
            tag,
            category,
            since,
        }
    }

    /// Kind part of the tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        split_tag(self.tag).map_or(self.tag, |(kind, _)| kind)
    }

    /// Version part of the tag.
    #[must_use]
    pub fn version(&self) -> u32 {
        split_tag(self.tag).map_or(0, |(_, version)| version)
    }
}

const V0_10: EngineVersion = EngineVersion::new(0, 10, 0);
const V0_22: EngineVersion = EngineVersion::new(0, 22, 0);

/// All readable tags.
pub static TAGS: &[TagSpec] = &[
    TagSpec::new("ksqlPlanV1", TagCategory::PlanEntry, V0_10),
    TagSpec::new("createStreamV1", TagCategory::DdlCommand, V0_10),
    TagSpec::new("createTableV1", TagCategory::DdlCommand, V0_10),
    TagSpec::new("streamSourceV1", TagCategory::PlanNode, V0_10),
    TagSpec::new("tableSourceV1", TagCategory::PlanNode, V0_10),
    TagSpec::new("tableSourceV2", TagCategory::PlanNode, V0_22),
    TagSpec::new("streamFilterV1", TagCategory::PlanNode, V0_10),
    TagSpec::new("streamSelectV1", TagCategory::PlanNode, V0_10),
    TagSpec::new("streamGroupByKeyV1", TagCategory::PlanNode, V0_10),
    TagSpec::new("streamAggregateV1", TagCategory::PlanNode, V0_10),
    TagSpec::new("streamSinkV1", TagCategory::PlanNode, V0_10),
    TagSpec::new("tableFilterV1", TagCategory::PlanNode, V0_10),
    TagSpec::new("tableSelectV1", TagCategory::PlanNode, V0_10),
    TagSpec::new("tableSinkV1", TagCategory::PlanNode, V0_10),
];

fn split_tag(tag: &str) -> Option<(&str, u32)> {
    let split = tag.rfind('V')?;
    let (kind, version) = (&tag[..split], &tag[split + 1..]);
    let mut chars = kind.chars();
    let starts_lower = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    if !starts_lower || !chars.all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    version.parse().ok().map(|v| (kind, v))
}

/// Splits a tag into its kind and version.
///
/// # Errors
///
/// Returns `PlanError::InvalidTag` unless the tag has the form
/// `<kindLowerCamel>V<integer>`.
pub fn parse_tag(tag: &str) -> Result<(&str, u32), PlanError> {
    split_tag(tag).ok_or_else(|| PlanError::InvalidTag(tag.to_string()))
}

/// Looks up a tag in the table.
#[must_use]
pub fn lookup(tag: &str) -> Option<&'static TagSpec> {
    TAGS.iter().find(|spec| spec.tag == tag)
}

/// Resolves a tag found at `path`, where a tag of `category` is expected.
///
/// # Errors
///
/// Returns `PlanError::InvalidTag` for malformed tags,
/// `PlanError::UnsupportedVersion` when the kind is known in this position
/// but not at this version, and `PlanError::UnknownTag` otherwise.
pub fn resolve(tag: &str, category: TagCategory, path: &str) -> Result<&'static TagSpec, PlanError> {
    let (kind, _) = parse_tag(tag)?;
    if let Some(spec) = lookup(tag).filter(|spec| spec.category == category) {
        return Ok(spec);
    }
    let kind_known = TAGS
        .iter()
        .any(|spec| spec.category == category && spec.kind() == kind);
    if kind_known {
        Err(PlanError::UnsupportedVersion {
            kind: kind.to_string(),
            tag: tag.to_string(),
            path: path.to_string(),
        })
    } else {
        Err(PlanError::UnknownTag {
            tag: tag.to_string(),
            path: path.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tag() {
        assert_eq!(parse_tag("tableSinkV1").unwrap(), ("tableSink", 1));
        assert_eq!(parse_tag("streamGroupByKeyV12").unwrap(), ("streamGroupByKey", 12));
        assert!(parse_tag("TableSinkV1").is_err());
        assert!(parse_tag("tableSink").is_err());
        assert!(parse_tag("tableSinkV").is_err());
        assert!(parse_tag("V1").is_err());
        assert!(parse_tag("table-sinkV1").is_err());
    }

    #[test]
    fn test_table_tags_are_well_formed_and_unique() {
        let mut seen = std::collections::HashSet::new();
        for spec in TAGS {
            assert!(parse_tag(spec.tag).is_ok(), "bad tag {}", spec.tag);
            assert!(seen.insert(spec.tag), "duplicate tag {}", spec.tag);
        }
    }

    #[test]
    fn test_resolve_known_tag() {
        let spec = resolve("tableSourceV2", TagCategory::PlanNode, "$").unwrap();
        assert_eq!(spec.kind(), "tableSource");
        assert_eq!(spec.version(), 2);
        assert_eq!(spec.since, EngineVersion::new(0, 22, 0));
    }

    #[test]
    fn test_resolve_unsupported_version() {
        let err = resolve("tableSinkV9", TagCategory::PlanNode, "$.x").unwrap_err();
        assert!(matches!(err, PlanError::UnsupportedVersion { ref kind, .. } if kind == "tableSink"));
        assert!(err.is_version_error());
    }

    #[test]
    fn test_resolve_unknown_kind() {
        let err = resolve("streamWindowedJoinV1", TagCategory::PlanNode, "$").unwrap_err();
        assert!(matches!(err, PlanError::UnknownTag { .. }));
    }

    #[test]
    fn test_resolve_tag_in_wrong_position() {
        let err = resolve("tableSinkV1", TagCategory::DdlCommand, "$").unwrap_err();
        assert!(matches!(err, PlanError::UnknownTag { .. }));
    }
}
