//! DDL commands recorded in plan documents.

use serde::{Deserialize, Serialize};

use crate::format::Formats;
use crate::schema::LogicalSchema;

/// Body shared by `CREATE STREAM` and `CREATE TABLE` commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSourceCommand {
    /// Name of the created source. This is the command's identity.
    pub source_name: String,
    /// Column schema of the source.
    pub schema: LogicalSchema,
    /// Backing topic.
    pub topic_name: String,
    /// Key and value formats.
    pub formats: Formats,
    /// Whether the command replaces an existing source of the same name.
    #[serde(default)]
    pub or_replace: bool,
    /// Column holding the event timestamp, if not the record timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_column: Option<String>,
}

/// A DDL command, tagged by kind and version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum DdlCommand {
    /// `CREATE STREAM`
    #[serde(rename = "createStreamV1")]
    CreateStream(CreateSourceCommand),
    /// `CREATE TABLE`
    #[serde(rename = "createTableV1")]
    CreateTable(CreateSourceCommand),
}

impl DdlCommand {
    /// The versioned `@type` tag this command is written with.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            DdlCommand::CreateStream(_) => "createStreamV1",
            DdlCommand::CreateTable(_) => "createTableV1",
        }
    }

    /// The command body.
    #[must_use]
    pub fn command(&self) -> &CreateSourceCommand {
        match self {
            DdlCommand::CreateStream(cmd) | DdlCommand::CreateTable(cmd) => cmd,
        }
    }

    /// Name of the source the command creates.
    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.command().source_name
    }

    /// Returns `true` for table-creating commands.
    #[must_use]
    pub fn is_table(&self) -> bool {
        matches!(self, DdlCommand::CreateTable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> CreateSourceCommand {
        CreateSourceCommand {
            source_name: "PAGEVIEWS".into(),
            schema: "`ID` INTEGER KEY, `PAGE` STRING".parse().unwrap(),
            topic_name: "pageviews".into(),
            formats: Formats::of("KAFKA", "JSON"),
            or_replace: false,
            timestamp_column: None,
        }
    }

    #[test]
    fn test_create_stream_wire_shape() {
        let ddl = DdlCommand::CreateStream(command());
        let value = serde_json::to_value(&ddl).unwrap();
        assert_eq!(value["@type"], "createStreamV1");
        assert_eq!(value["sourceName"], "PAGEVIEWS");
        assert_eq!(value["schema"], "`ID` INTEGER KEY, `PAGE` STRING");
        assert_eq!(value["orReplace"], false);
        assert!(value.get("timestampColumn").is_none());
    }

    #[test]
    fn test_missing_or_replace_defaults_false() {
        let json = r#"{"@type":"createTableV1","sourceName":"T","schema":"`K` STRING KEY, `V` BIGINT",
            "topicName":"t","formats":{"keyFormat":{"format":"KAFKA"},"valueFormat":{"format":"JSON"}}}"#;
        let ddl: DdlCommand = serde_json::from_str(json).unwrap();
        assert!(ddl.is_table());
        assert!(!ddl.command().or_replace);
        assert_eq!(ddl.source_name(), "T");
    }
}
