//! Field mapping from source records to destination field values.
//!
//! The set of migrated fields is data: an ordered list of [`FieldMapping`]s,
//! each naming a source extractor, a destination field and a transform. Every
//! mapping is resolved independently, so one bad field never affects the
//! others.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::model::{FieldValue, SourceRecord};
use crate::report::Failure;
use crate::richtext::RichText;
use crate::schema::{DestinationSchema, SchemaResolver};

/// Prefix selecting an entry of the source field map.
const FIELD_PREFIX: &str = "fields.";

/// Where a mapping reads its value from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceExtractor {
    /// Stable source identifier.
    Id,
    /// Human key.
    Key,
    /// Title.
    Title,
    /// Status label.
    Status,
    /// Ids of all linked records.
    Links,
    /// Entry of the typed field map (`fields.<name>`).
    Field(String),
    /// No source value; the destination field is always sent as null.
    Empty,
}

impl FromStr for SourceExtractor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(Self::Id),
            "key" => Ok(Self::Key),
            "title" => Ok(Self::Title),
            "status" => Ok(Self::Status),
            "links" => Ok(Self::Links),
            "none" => Ok(Self::Empty),
            other => match other.strip_prefix(FIELD_PREFIX) {
                Some(name) if !name.is_empty() => Ok(Self::Field(name.to_string())),
                _ => Err(Error::Config(format!(
                    "Unknown source '{}'. Expected id, key, title, status, links, none or fields.<name>",
                    other
                ))),
            },
        }
    }
}

impl TryFrom<String> for SourceExtractor {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceExtractor> for String {
    fn from(value: SourceExtractor) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SourceExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id => f.write_str("id"),
            Self::Key => f.write_str("key"),
            Self::Title => f.write_str("title"),
            Self::Status => f.write_str("status"),
            Self::Links => f.write_str("links"),
            Self::Field(name) => write!(f, "{}{}", FIELD_PREFIX, name),
            Self::Empty => f.write_str("none"),
        }
    }
}

/// How a source value becomes a destination value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// Copy text and numbers verbatim.
    #[default]
    Passthrough,
    /// Timestamp to epoch milliseconds.
    Date,
    /// Label to one option id.
    SingleSelect,
    /// Labels to a list of option ids.
    MultiSelect,
    /// Linked record ids, serialized as a JSON array string.
    Links,
    /// Rich text flattened to plain text.
    RichText,
}

/// One field mapping rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Destination field name, resolved against the schema.
    pub destination: String,
    /// Source extractor.
    pub source: SourceExtractor,
    /// Transform to apply.
    #[serde(default)]
    pub transform: TransformKind,
    /// Text used when the source value is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl FieldMapping {
    /// Creates a mapping without a default.
    pub fn new(destination: impl Into<String>, source: SourceExtractor, transform: TransformKind) -> Self {
        Self {
            destination: destination.into(),
            source,
            transform,
            default: None,
        }
    }

    /// Sets the fallback text for missing values.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// A resolved destination value.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    /// Explicitly unset.
    Null,
    /// Scalar JSON value.
    Scalar(Value),
    /// Destination option identifiers.
    Options(Vec<String>),
}

impl ResolvedValue {
    /// JSON form sent to the destination.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Scalar(value) => value.clone(),
            Self::Options(ids) => Value::Array(ids.iter().cloned().map(Value::String).collect()),
        }
    }

    /// Whether the value is [`ResolvedValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// One destination field/value pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedField {
    /// Destination field identifier (always present in the schema snapshot).
    pub field_id: String,
    /// Destination field name.
    pub destination: String,
    /// Resolved value.
    pub value: ResolvedValue,
}

/// Ordered mapped values for one record, plus resolution failures.
#[derive(Debug, Clone, Default)]
pub struct MappedFieldSet {
    /// Entries in mapping order.
    pub entries: Vec<MappedField>,
    /// Failures reported while resolving.
    pub failures: Vec<Failure>,
}

impl MappedFieldSet {
    /// Entry for a destination field name.
    pub fn get(&self, destination: &str) -> Option<&MappedField> {
        self.entries.iter().find(|e| e.destination == destination)
    }
}

/// Applies field mappings to source records.
#[derive(Debug, Clone, Default)]
pub struct FieldMapper {
    mappings: Vec<FieldMapping>,
}

impl FieldMapper {
    /// Creates a mapper from an ordered mapping list.
    pub fn new(mappings: Vec<FieldMapping>) -> Self {
        Self { mappings }
    }

    /// The mapping list.
    pub fn mappings(&self) -> &[FieldMapping] {
        &self.mappings
    }

    /// Maps one record against a schema snapshot.
    ///
    /// Mappings whose destination field is absent from the schema are
    /// reported and left out; every other mapping yields exactly one entry.
    pub fn map(&self, record: &SourceRecord, schema: &DestinationSchema) -> MappedFieldSet {
        let mut resolver = SchemaResolver::new(schema);
        let mut entries = Vec::with_capacity(self.mappings.len());

        for mapping in &self.mappings {
            let Some(field_id) = resolver.field_id(&mapping.destination) else {
                continue;
            };

            let value = match extract(&mapping.source, record)
                .or_else(|| mapping.default.clone().map(FieldValue::Text))
            {
                Some(value) => transform(mapping, value, &mut resolver),
                None => ResolvedValue::Null,
            };

            entries.push(MappedField {
                field_id,
                destination: mapping.destination.clone(),
                value,
            });
        }

        MappedFieldSet {
            entries,
            failures: resolver.into_failures(),
        }
    }
}

fn extract(source: &SourceExtractor, record: &SourceRecord) -> Option<FieldValue> {
    match source {
        SourceExtractor::Id => Some(FieldValue::Text(record.id.clone())),
        SourceExtractor::Key => Some(FieldValue::Text(record.key.clone())),
        SourceExtractor::Title => Some(FieldValue::Text(record.title.clone())),
        SourceExtractor::Status => record.status.clone().map(FieldValue::Text),
        SourceExtractor::Links => {
            if record.links.is_empty() {
                None
            } else {
                Some(FieldValue::References(
                    record.links.iter().map(|l| l.id.clone()).collect(),
                ))
            }
        }
        SourceExtractor::Field(name) => record.fields.get(name).cloned(),
        SourceExtractor::Empty => None,
    }
}

fn transform(
    mapping: &FieldMapping,
    value: FieldValue,
    resolver: &mut SchemaResolver<'_>,
) -> ResolvedValue {
    let field = mapping.destination.as_str();

    match mapping.transform {
        TransformKind::Passthrough => passthrough(field, value, resolver),
        TransformKind::Date => match value {
            FieldValue::Date(ts) => ResolvedValue::Scalar(Value::from(ts.timestamp_millis())),
            FieldValue::Number(n) => ResolvedValue::Scalar(Value::Number(n)),
            FieldValue::Text(ref s) | FieldValue::Enum(ref s) => match parse_timestamp(s) {
                Some(ts) => ResolvedValue::Scalar(Value::from(ts.timestamp_millis())),
                None => {
                    resolver.fail(field, &Error::ContentParse(format!("'{}' is not a date", s)));
                    ResolvedValue::Null
                }
            },
            other => {
                resolver.fail(
                    field,
                    &Error::ContentParse(format!("{:?} cannot be converted to a date", other)),
                );
                ResolvedValue::Null
            }
        },
        TransformKind::SingleSelect => match labels_of(field, &value, resolver).first() {
            Some(label) => resolver
                .option_id(field, label)
                .map_or(ResolvedValue::Null, |id| ResolvedValue::Scalar(Value::String(id))),
            None => ResolvedValue::Null,
        },
        TransformKind::MultiSelect => {
            let labels = labels_of(field, &value, resolver);
            let ids = labels
                .iter()
                .filter_map(|label| resolver.option_id(field, label))
                .collect();
            ResolvedValue::Options(ids)
        }
        TransformKind::Links => {
            let ids = labels_of(field, &value, resolver);
            if ids.is_empty() {
                return ResolvedValue::Null;
            }
            match serde_json::to_string(&ids) {
                Ok(json) => ResolvedValue::Scalar(Value::String(json)),
                Err(e) => {
                    resolver.fail(field, &Error::from(e));
                    ResolvedValue::Null
                }
            }
        }
        TransformKind::RichText => match value {
            FieldValue::Document(_) | FieldValue::Text(_) => text_or_null(field, &value, resolver),
            other => passthrough(field, other, resolver),
        },
    }
}

fn passthrough(field: &str, value: FieldValue, resolver: &mut SchemaResolver<'_>) -> ResolvedValue {
    match value {
        FieldValue::Text(s) | FieldValue::Enum(s) => ResolvedValue::Scalar(Value::String(s)),
        FieldValue::Number(n) => ResolvedValue::Scalar(Value::Number(n)),
        FieldValue::Date(ts) => ResolvedValue::Scalar(Value::String(ts.to_rfc3339())),
        FieldValue::EnumList(items) | FieldValue::References(items) => items
            .into_iter()
            .next()
            .map_or(ResolvedValue::Null, |s| ResolvedValue::Scalar(Value::String(s))),
        doc @ FieldValue::Document(_) => text_or_null(field, &doc, resolver),
    }
}

/// Plain text of a text or document value; empty content is `Null`.
fn text_or_null(field: &str, value: &FieldValue, resolver: &mut SchemaResolver<'_>) -> ResolvedValue {
    let text = match value {
        FieldValue::Text(s) => s.clone(),
        FieldValue::Document(doc) => match RichText::parse(doc) {
            Ok(tree) => tree.plain_text(),
            Err(e) => {
                resolver.fail(field, &e);
                return ResolvedValue::Null;
            }
        },
        _ => String::new(),
    };

    if text.trim().is_empty() {
        ResolvedValue::Null
    } else {
        ResolvedValue::Scalar(Value::String(text))
    }
}

/// Labels used for option resolution, in source order.
fn labels_of(field: &str, value: &FieldValue, resolver: &mut SchemaResolver<'_>) -> Vec<String> {
    match value {
        FieldValue::Text(s) | FieldValue::Enum(s) => vec![s.clone()],
        FieldValue::EnumList(items) | FieldValue::References(items) => items.clone(),
        FieldValue::Number(n) => vec![n.to_string()],
        FieldValue::Date(ts) => vec![ts.to_rfc3339()],
        FieldValue::Document(doc) => match RichText::parse(doc) {
            Ok(tree) => vec![tree.plain_text()],
            Err(e) => {
                resolver.fail(field, &e);
                Vec::new()
            }
        },
    }
}

/// Parses the timestamp formats seen in tracker APIs.
///
/// Accepts RFC 3339, Jira's `2024-03-01T10:15:00.000+0000` and plain dates
/// (taken as UTC midnight).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
#[path = "mapper_tests.rs"]
mod tests;
