//! Source-side data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A typed source field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Free text.
    Text(String),
    /// Number, kept exactly as the source reported it.
    Number(serde_json::Number),
    /// Timestamp.
    Date(DateTime<Utc>),
    /// Single enumerated value (option, user, priority...), by label.
    Enum(String),
    /// Several enumerated values, by label, in source order.
    EnumList(Vec<String>),
    /// Identifiers of other source records.
    References(Vec<String>),
    /// Raw rich-text document.
    Document(serde_json::Value),
}

/// One source comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceComment {
    /// Display name of the author.
    pub author: String,
    /// Raw rich-text body, parsed when the rollup is built.
    pub body: serde_json::Value,
}

/// Reference to a binary attachment on the source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Source attachment identifier.
    pub id: String,
    /// Original file name.
    pub file_name: String,
    /// Size in bytes, if reported.
    #[serde(default)]
    pub size: Option<u64>,
}

/// Direction of a cross-record link, relative to the owning record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkDirection {
    /// The other record points at this one.
    Inward,
    /// This record points at the other one.
    Outward,
}

/// A cross-reference to another source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRef {
    /// Link direction.
    pub direction: LinkDirection,
    /// Stable source id of the linked record.
    pub id: String,
    /// Human key of the linked record.
    pub key: String,
}

/// One migratable unit, with its nested children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Stable, globally unique source identifier.
    pub id: String,
    /// Human key (e.g. `LE-42`).
    pub key: String,
    /// Title / summary.
    pub title: String,
    /// Raw rich-text description.
    #[serde(default)]
    pub description: Option<serde_json::Value>,
    /// Status label.
    #[serde(default)]
    pub status: Option<String>,
    /// Typed field values keyed by source field name.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    /// Comments in chronological order.
    #[serde(default)]
    pub comments: Vec<SourceComment>,
    /// Attachments.
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    /// Child records in source order.
    #[serde(default)]
    pub children: Vec<SourceRecord>,
    /// Cross-references to other records.
    #[serde(default)]
    pub links: Vec<LinkRef>,
    /// Whether this is the full representation rather than a summary.
    #[serde(default)]
    pub expanded: bool,
}

impl SourceRecord {
    /// Creates a summary record with only identity and title.
    pub fn summary(id: impl Into<String>, key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            title: title.into(),
            ..Default::default()
        }
    }
}

/// One page of source records.
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    /// Records on this page.
    pub records: Vec<SourceRecord>,
    /// Total reported by the source. Informational only.
    pub total: Option<u64>,
}
