//! Column schemas and their single-string wire form.
//!
//! A [`LogicalSchema`] travels inside plans as one string such as
//! `` `ID` INTEGER KEY, `VAL` INTEGER ``. Parsing and rendering are exact
//! inverses for canonical text, which keeps re-encoded plans byte-stable.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PlanError;

/// SQL column type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SqlType {
    /// `BOOLEAN`
    Boolean,
    /// `INTEGER`
    Integer,
    /// `BIGINT`
    Bigint,
    /// `DOUBLE`
    Double,
    /// `STRING`
    String,
    /// `BYTES`
    Bytes,
    /// `DATE`
    Date,
    /// `TIME`
    Time,
    /// `TIMESTAMP`
    Timestamp,
    /// `DECIMAL(precision, scale)`
    Decimal {
        /// Total digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// `ARRAY<T>`
    Array(Box<SqlType>),
    /// `MAP<K, V>`
    Map(Box<SqlType>, Box<SqlType>),
    /// `` STRUCT<`F` T, ...> ``
    Struct(Vec<StructField>),
}

/// A named field of a `STRUCT` type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    /// Field name.
    pub name: String,
    /// Field type.
    pub sql_type: SqlType,
}

/// A column of a [`LogicalSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column type.
    pub sql_type: SqlType,
    /// Whether the column is part of the record key.
    pub is_key: bool,
}

impl Column {
    /// Creates a key column.
    #[must_use]
    pub fn key(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            is_key: true,
        }
    }

    /// Creates a value column.
    #[must_use]
    pub fn value(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            is_key: false,
        }
    }
}

/// Ordered column list with key columns first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalSchema {
    columns: Vec<Column>,
}

impl LogicalSchema {
    /// Builds a schema, checking that key columns form a prefix and that
    /// column names are unique.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::Schema` if the column list violates either rule
    /// or is empty.
    pub fn new(columns: Vec<Column>) -> Result<Self, PlanError> {
        if columns.is_empty() {
            return Err(PlanError::Schema("schema has no columns".into()));
        }
        let mut seen_value = false;
        let mut names = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.is_key && seen_value {
                return Err(PlanError::Schema(format!(
                    "key column `{}` follows a value column",
                    column.name
                )));
            }
            seen_value |= !column.is_key;
            if !names.insert(column.name.as_str()) {
                return Err(PlanError::Schema(format!(
                    "duplicate column `{}`",
                    column.name
                )));
            }
        }
        Ok(Self { columns })
    }

    /// All columns in order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Key columns in order.
    pub fn key_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_key)
    }

    /// Value columns in order.
    pub fn value_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.is_key)
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

fn write_ident(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    write!(f, "`{}`", name.replace('`', "``"))
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Boolean => f.write_str("BOOLEAN"),
            SqlType::Integer => f.write_str("INTEGER"),
            SqlType::Bigint => f.write_str("BIGINT"),
            SqlType::Double => f.write_str("DOUBLE"),
            SqlType::String => f.write_str("STRING"),
            SqlType::Bytes => f.write_str("BYTES"),
            SqlType::Date => f.write_str("DATE"),
            SqlType::Time => f.write_str("TIME"),
            SqlType::Timestamp => f.write_str("TIMESTAMP"),
            SqlType::Decimal { precision, scale } => write!(f, "DECIMAL({precision}, {scale})"),
            SqlType::Array(element) => write!(f, "ARRAY<{element}>"),
            SqlType::Map(key, value) => write!(f, "MAP<{key}, {value}>"),
            SqlType::Struct(fields) => {
                f.write_str("STRUCT<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_ident(f, &field.name)?;
                    write!(f, " {}", field.sql_type)?;
                }
                f.write_str(">")
            }
        }
    }
}

impl fmt::Display for LogicalSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_ident(f, &column.name)?;
            write!(f, " {}", column.sql_type)?;
            if column.is_key {
                f.write_str(" KEY")?;
            }
        }
        Ok(())
    }
}

impl FromStr for SqlType {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = SchemaParser::new(s);
        let sql_type = parser.sql_type()?;
        parser.end()?;
        Ok(sql_type)
    }
}

impl FromStr for LogicalSchema {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = SchemaParser::new(s);
        let mut columns = Vec::new();
        loop {
            let name = parser.ident()?;
            let sql_type = parser.sql_type()?;
            let is_key = parser.try_keyword("KEY");
            columns.push(Column {
                name,
                sql_type,
                is_key,
            });
            if !parser.try_char(',') {
                break;
            }
        }
        parser.end()?;
        LogicalSchema::new(columns)
    }
}

impl Serialize for LogicalSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LogicalSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Deepest type nesting accepted in a schema string.
pub const MAX_TYPE_DEPTH: usize = 64;

/// Recursive-descent parser over the schema grammar.
struct SchemaParser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> SchemaParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn error(&self, expected: &str) -> PlanError {
        PlanError::Schema(format!(
            "expected {expected} at offset {} in '{}'",
            self.pos, self.input
        ))
    }

    fn try_char(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, c: char) -> Result<(), PlanError> {
        if self.try_char(c) {
            Ok(())
        } else {
            Err(self.error(&format!("'{c}'")))
        }
    }

    fn word(&mut self) -> &'a str {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn try_keyword(&mut self, keyword: &str) -> bool {
        let start = self.pos;
        if self.word().eq_ignore_ascii_case(keyword) {
            true
        } else {
            self.pos = start;
            false
        }
    }

    fn number(&mut self) -> Result<u8, PlanError> {
        let word = self.word();
        word.parse().map_err(|_| self.error("a number"))
    }

    fn ident(&mut self) -> Result<String, PlanError> {
        self.expect_char('`')?;
        let mut name = String::new();
        let mut chars = self.rest().char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c != '`' {
                name.push(c);
                continue;
            }
            if matches!(chars.peek(), Some((_, '`'))) {
                chars.next();
                name.push('`');
                continue;
            }
            self.pos += i + 1;
            return Ok(name);
        }
        Err(self.error("closing '`'"))
    }

    fn sql_type(&mut self) -> Result<SqlType, PlanError> {
        if self.depth >= MAX_TYPE_DEPTH {
            return Err(PlanError::Schema(format!(
                "type nesting too deep at offset {} (limit {MAX_TYPE_DEPTH})",
                self.pos
            )));
        }
        self.depth += 1;
        let sql_type = self.type_body();
        self.depth -= 1;
        sql_type
    }

    fn type_body(&mut self) -> Result<SqlType, PlanError> {
        let word = self.word().to_ascii_uppercase();
        let sql_type = match word.as_str() {
            "BOOLEAN" => SqlType::Boolean,
            "INTEGER" => SqlType::Integer,
            "BIGINT" => SqlType::Bigint,
            "DOUBLE" => SqlType::Double,
            "STRING" => SqlType::String,
            "BYTES" => SqlType::Bytes,
            "DATE" => SqlType::Date,
            "TIME" => SqlType::Time,
            "TIMESTAMP" => SqlType::Timestamp,
            "DECIMAL" => {
                self.expect_char('(')?;
                let precision = self.number()?;
                self.expect_char(',')?;
                let scale = self.number()?;
                self.expect_char(')')?;
                SqlType::Decimal { precision, scale }
            }
            "ARRAY" => {
                self.expect_char('<')?;
                let element = self.sql_type()?;
                self.expect_char('>')?;
                SqlType::Array(Box::new(element))
            }
            "MAP" => {
                self.expect_char('<')?;
                let key = self.sql_type()?;
                self.expect_char(',')?;
                let value = self.sql_type()?;
                self.expect_char('>')?;
                SqlType::Map(Box::new(key), Box::new(value))
            }
            "STRUCT" => {
                self.expect_char('<')?;
                let mut fields = Vec::new();
                if !self.try_char('>') {
                    loop {
                        let name = self.ident()?;
                        let sql_type = self.sql_type()?;
                        fields.push(StructField { name, sql_type });
                        if !self.try_char(',') {
                            break;
                        }
                    }
                    self.expect_char('>')?;
                }
                SqlType::Struct(fields)
            }
            _ => return Err(self.error("a SQL type")),
        };
        Ok(sql_type)
    }

    fn end(&mut self) -> Result<(), PlanError> {
        self.skip_ws();
        if self.rest().is_empty() {
            Ok(())
        } else {
            Err(self.error("end of schema"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_schema() {
        let schema: LogicalSchema = "`ID` INTEGER KEY, `VAL` INTEGER".parse().unwrap();
        assert_eq!(schema.columns().len(), 2);
        assert_eq!(schema.key_columns().count(), 1);
        assert_eq!(schema.column("VAL").unwrap().sql_type, SqlType::Integer);
        assert!(!schema.column("VAL").unwrap().is_key);
    }

    #[test]
    fn test_canonical_text_is_stable() {
        let text = "`K` STRING KEY, `A` ARRAY<STRUCT<`X` INTEGER, `Y` MAP<STRING, DECIMAL(10, 2)>>>, \
                    `B` STRUCT<`N` STRUCT<`M` BOOLEAN>>";
        let schema: LogicalSchema = text.parse().unwrap();
        assert_eq!(schema.to_string(), text);
    }

    #[test]
    fn test_nested_struct_shape() {
        let schema: LogicalSchema = "`S` STRUCT<`F` ARRAY<BIGINT>>".parse().unwrap();
        let SqlType::Struct(fields) = &schema.columns()[0].sql_type else {
            panic!("expected struct");
        };
        assert_eq!(fields[0].name, "F");
        assert_eq!(fields[0].sql_type, SqlType::Array(Box::new(SqlType::Bigint)));
    }

    #[test]
    fn test_key_must_be_prefix() {
        let err = "`VAL` INTEGER, `ID` INTEGER KEY"
            .parse::<LogicalSchema>()
            .unwrap_err();
        assert!(matches!(err, PlanError::Schema(_)));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        assert!("`A` INTEGER, `A` STRING".parse::<LogicalSchema>().is_err());
    }

    #[test]
    fn test_escaped_backtick_in_name() {
        let schema = LogicalSchema::new(vec![Column::value("we`ird", SqlType::String)]).unwrap();
        let text = schema.to_string();
        assert_eq!(text, "`we``ird` STRING");
        assert_eq!(text.parse::<LogicalSchema>().unwrap(), schema);
    }

    #[test]
    fn test_invalid_type_rejected() {
        assert!("`A` FLOATY".parse::<LogicalSchema>().is_err());
        assert!("`A` ARRAY<INTEGER".parse::<LogicalSchema>().is_err());
        assert!("".parse::<LogicalSchema>().is_err());
    }

    fn nested_arrays(depth: usize) -> String {
        format!("`A` {}INTEGER{}", "ARRAY<".repeat(depth), ">".repeat(depth))
    }

    #[test]
    fn test_nesting_depth_limit() {
        let deepest = nested_arrays(MAX_TYPE_DEPTH - 1);
        assert!(deepest.parse::<LogicalSchema>().is_ok());

        let err = nested_arrays(MAX_TYPE_DEPTH)
            .parse::<LogicalSchema>()
            .unwrap_err();
        assert!(matches!(&err, PlanError::Schema(msg) if msg.contains("too deep")));

        // Far past the limit must fail fast rather than exhaust the stack.
        assert!(nested_arrays(200_000).parse::<LogicalSchema>().is_err());
        assert!(nested_arrays(200_000).parse::<SqlType>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let schema: LogicalSchema = "`ID` BIGINT KEY, `NAME` STRING".parse().unwrap();
        let json = serde_json::to_string(&schema).unwrap();
        assert_eq!(json, r#""`ID` BIGINT KEY, `NAME` STRING""#);
        let back: LogicalSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }
}
