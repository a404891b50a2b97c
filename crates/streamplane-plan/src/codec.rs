//! JSON encoding and decoding of plan documents.
//!
//! Decoding happens in two passes. The raw JSON is first walked and every
//! `@type` tag is resolved against the [`registry`](crate::registry); only
//! then is the typed model deserialized. Unknown sibling fields on known
//! tags are ignored by the typed pass.

use serde_json::Value;
use tracing::debug;

use crate::document::PlanDocument;
use crate::error::PlanError;
use crate::registry::{self, TagCategory};

/// Encodes a plan document to its persisted JSON form.
///
/// # Errors
///
/// Returns `PlanError::Json` if serialization fails.
pub fn encode(document: &PlanDocument) -> Result<Vec<u8>, PlanError> {
    let bytes = serde_json::to_vec(document)?;
    debug!(
        entries = document.plan.len(),
        bytes = bytes.len(),
        "encoded plan document"
    );
    Ok(bytes)
}

/// Decodes and validates a persisted plan document.
///
/// # Errors
///
/// Returns a version error (`UnknownTag` / `UnsupportedVersion`) for tags
/// this engine cannot read, `PlanError::Json` for malformed bodies, and
/// `PlanError::InvalidPlan` for structurally invalid plans.
pub fn decode(bytes: &[u8]) -> Result<PlanDocument, PlanError> {
    let value: Value = serde_json::from_slice(bytes)?;
    check_tags(&value)?;
    let document: PlanDocument = serde_json::from_value(value)?;
    document.validate()?;
    debug!(
        entries = document.plan.len(),
        configs = document.configs.len(),
        "decoded plan document"
    );
    Ok(document)
}

/// Resolves every tag in a raw document against the tag table.
fn check_tags(document: &Value) -> Result<(), PlanError> {
    let Some(entries) = document.get("plan").and_then(Value::as_array) else {
        return Ok(());
    };
    for (i, entry) in entries.iter().enumerate() {
        let path = format!("$.plan[{i}]");
        check_tag(entry, TagCategory::PlanEntry, &path)?;

        if let Some(ddl) = entry.get("ddlCommand") {
            check_tag(ddl, TagCategory::DdlCommand, &format!("{path}.ddlCommand"))?;
        }

        let mut node_path = format!("{path}.queryPlan.physicalPlan");
        let mut node = entry
            .get("queryPlan")
            .and_then(|query| query.get("physicalPlan"));
        while let Some(current) = node {
            check_tag(current, TagCategory::PlanNode, &node_path)?;
            node = current.get("source");
            node_path.push_str(".source");
        }
    }
    Ok(())
}

fn check_tag(object: &Value, category: TagCategory, path: &str) -> Result<(), PlanError> {
    match object.get("@type") {
        Some(Value::String(tag)) => registry::resolve(tag, category, path).map(|_| ()),
        Some(other) => Err(PlanError::InvalidTag(other.to_string())),
        None => Err(PlanError::MissingTag(format!("{path} ({category})"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_round_trip_preserves_everything() {
        let document = testing::aggregate_document();
        let bytes = encode(&document).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, document);
    }

    #[test]
    fn test_null_configs_and_absent_optionals() {
        let document = testing::aggregate_document();
        let bytes = encode(&document).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains(r#""ksql.schema.registry.url":null"#));
        // The CREATE STREAM entry has no query plan and must not emit one.
        let raw: Value = serde_json::from_str(&text).unwrap();
        assert!(raw["plan"][0].get("queryPlan").is_none());
        assert!(raw["plan"][0]["ddlCommand"].get("timestampColumn").is_none());
    }

    #[test]
    fn test_unknown_node_kind_is_version_error() {
        let mut raw: Value = serde_json::to_value(testing::aggregate_document()).unwrap();
        raw["plan"][1]["queryPlan"]["physicalPlan"]["source"]["source"]["@type"] =
            Value::from("streamWindowedAggregateV1");
        let err = decode(&serde_json::to_vec(&raw).unwrap()).unwrap_err();

        assert!(err.is_version_error());
        match err {
            PlanError::UnknownTag { tag, path } => {
                assert_eq!(tag, "streamWindowedAggregateV1");
                assert_eq!(path, "$.plan[1].queryPlan.physicalPlan.source.source");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_future_version_of_known_kind_is_version_error() {
        let mut raw: Value = serde_json::to_value(testing::aggregate_document()).unwrap();
        raw["plan"][0]["@type"] = Value::from("ksqlPlanV2");
        let err = decode(&serde_json::to_vec(&raw).unwrap()).unwrap_err();
        assert!(matches!(err, PlanError::UnsupportedVersion { .. }));
    }

    #[test]
    fn test_unknown_sibling_fields_are_tolerated() {
        let document = testing::aggregate_document();
        let mut raw: Value = serde_json::to_value(&document).unwrap();
        raw["plan"][1]["queryPlan"]["runtimeId"] = Value::from("r1");
        raw["plan"][1]["queryPlan"]["physicalPlan"]["properties"]["queryContextV2"] =
            Value::from("x");
        raw["plan"][1]["ddlCommand"]["isSource"] = Value::from(false);

        let decoded = decode(&serde_json::to_vec(&raw).unwrap()).unwrap();
        assert_eq!(decoded, document);
    }

    #[test]
    fn test_missing_tag_rejected() {
        let mut raw: Value = serde_json::to_value(testing::aggregate_document()).unwrap();
        raw["plan"][0]["ddlCommand"]
            .as_object_mut()
            .unwrap()
            .remove("@type");
        let err = decode(&serde_json::to_vec(&raw).unwrap()).unwrap_err();
        assert!(matches!(err, PlanError::MissingTag(_)));
    }

    #[test]
    fn test_structurally_invalid_plan_rejected() {
        let mut raw: Value = serde_json::to_value(testing::aggregate_document()).unwrap();
        // Replace the sink root with its own child.
        let child = raw["plan"][1]["queryPlan"]["physicalPlan"]["source"].clone();
        raw["plan"][1]["queryPlan"]["physicalPlan"] = child;
        let err = decode(&serde_json::to_vec(&raw).unwrap()).unwrap_err();
        assert!(matches!(err, PlanError::InvalidPlan(_)));
    }

    #[test]
    fn test_garbage_is_json_error() {
        assert!(matches!(decode(b"{not json"), Err(PlanError::Json(_))));
        assert!(matches!(decode(b"{}"), Err(PlanError::Json(_))));
    }
}
