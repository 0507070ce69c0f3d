//! Connectors for the source and destination trackers.

pub mod clickup;
pub mod common;
pub mod dry_run;
pub mod jira;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::config::{DestinationConfig, SourceConfig};
use crate::error::Result;
use crate::mapper::MappedFieldSet;
use crate::model::{AttachmentRef, SourcePage, SourceRecord};

/// Stream of attachment bytes coming from the source.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// A destination field as listed by the destination API, before option shape
/// detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawField {
    /// Field identifier.
    pub id: String,
    /// Human-readable field name.
    pub name: String,
    /// Destination field type (e.g. `drop_down`, `labels`, `date`).
    #[serde(default)]
    pub field_type: String,
    /// Allowed values, for enumerated fields.
    #[serde(default)]
    pub options: Vec<RawOption>,
}

/// One allowed value of an enumerated destination field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOption {
    /// Option identifier.
    pub id: String,
    /// Display name (drop-down style options).
    #[serde(default)]
    pub name: Option<String>,
    /// Label (label style options).
    #[serde(default)]
    pub label: Option<String>,
}

/// Request to create one destination record.
#[derive(Debug, Clone)]
pub struct CreateRecordRequest {
    /// Title.
    pub title: String,
    /// Converted description text.
    pub description: String,
    /// Destination status name.
    pub status: Option<String>,
    /// Destination id of the parent record.
    pub parent: Option<String>,
    /// Resolved custom field values.
    pub fields: MappedFieldSet,
}

/// A custom field value read back from a destination record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationFieldValue {
    /// Field identifier.
    pub id: String,
    /// Field name.
    #[serde(default)]
    pub name: String,
    /// Current value, if set.
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

/// A destination record as returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationRecord {
    /// Destination identifier.
    pub id: String,
    /// Title.
    #[serde(default)]
    pub name: String,
    /// Custom field values.
    #[serde(default)]
    pub custom_fields: Vec<DestinationFieldValue>,
}

impl DestinationRecord {
    /// Value of a custom field, looked up by field id.
    pub fn field_value(&self, field_id: &str) -> Option<&serde_json::Value> {
        self.custom_fields
            .iter()
            .find(|f| f.id == field_id)
            .and_then(|f| f.value.as_ref())
            .filter(|v| !v.is_null())
    }
}

/// Custom-field predicate for destination searches.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    /// Field has any value.
    IsSet {
        /// Field identifier.
        field_id: String,
    },
    /// Field equals the given value.
    Equals {
        /// Field identifier.
        field_id: String,
        /// Expected value.
        value: String,
    },
}

/// Destination search parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    /// Restrict to these statuses (empty = any, closed included).
    pub statuses: Vec<String>,
    /// Custom-field predicate.
    pub filter: FieldFilter,
}

/// Trait for source tracker connectors.
///
/// Implement this trait to read from a new issue tracker.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Get the source type name.
    fn source_type(&self) -> &'static str;

    /// Fetch one page of top-level records.
    ///
    /// # Arguments
    ///
    /// * `offset` - Index of the first record to return
    /// * `page_size` - Maximum number of records to return
    async fn fetch_page(&self, offset: usize, page_size: usize) -> Result<SourcePage>;

    /// Fetch the full representation of a record (description, comments,
    /// attachments, children, links).
    async fn fetch_expanded(&self, record: &SourceRecord) -> Result<SourceRecord>;

    /// Open a byte stream over an attachment's content.
    async fn download_attachment(&self, attachment: &AttachmentRef) -> Result<ByteStream>;
}

/// Trait for destination tracker connectors.
#[async_trait]
pub trait DestinationConnector: Send + Sync {
    /// Get the destination type name.
    fn destination_type(&self) -> &'static str;

    /// List the destination's custom field catalog.
    async fn list_fields(&self) -> Result<Vec<RawField>>;

    /// Create a record and return its assigned identifier.
    async fn create_record(&self, request: &CreateRecordRequest) -> Result<String>;

    /// Upload a staged file as an attachment of `record_id`.
    async fn upload_attachment(&self, record_id: &str, file_name: &str, path: &Path)
        -> Result<()>;

    /// Post a comment on `record_id`.
    async fn post_comment(&self, record_id: &str, text: &str) -> Result<()>;

    /// Append values to a relationship field of `record_id`.
    async fn add_field_values(&self, record_id: &str, field_id: &str, values: &[String])
        -> Result<()>;

    /// Fetch one page (0-based) of records matching `query`.
    async fn search_records(&self, query: &RecordQuery, page: usize)
        -> Result<Vec<DestinationRecord>>;
}

/// Creates the source connector described by `config`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn create_source(
    config: &SourceConfig,
    request_timeout: Option<Duration>,
) -> Result<Box<dyn SourceConnector>> {
    match config {
        SourceConfig::Jira(cfg) => Ok(Box::new(jira::JiraConnector::new(
            cfg.clone(),
            request_timeout,
        )?)),
    }
}

/// Creates the destination connector described by `config`, wrapped so it
/// never writes when `dry_run` is set.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn create_destination(
    config: &DestinationConfig,
    dry_run: bool,
    request_timeout: Option<Duration>,
) -> Result<Box<dyn DestinationConnector>> {
    let connector: Box<dyn DestinationConnector> = match config {
        DestinationConfig::ClickUp(cfg) => Box::new(clickup::ClickUpConnector::new(
            cfg.clone(),
            request_timeout,
        )?),
    };
    if dry_run {
        Ok(Box::new(dry_run::DryRunDestination::new(connector)))
    } else {
        Ok(connector)
    }
}
