//! Failure reporting for partially failed runs.
//!
//! Every non-fatal failure is recorded with enough context (source key, field,
//! operation) to remediate it by hand after the run.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::error::Error;

/// Failure taxonomy used in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Destination schema has no field with the mapped name.
    SchemaFieldNotFound,
    /// Destination field has no option for a source label.
    SchemaOptionNotFound,
    /// Network or API error.
    Transport,
    /// Malformed comment, description or field content.
    ContentParse,
}

impl From<&Error> for FailureKind {
    fn from(error: &Error) -> Self {
        match error {
            Error::SchemaFieldNotFound(_) => Self::SchemaFieldNotFound,
            Error::SchemaOptionNotFound { .. } => Self::SchemaOptionNotFound,
            Error::ContentParse(_) | Error::Json(_) => Self::ContentParse,
            _ => Self::Transport,
        }
    }
}

/// The unit of work a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Resolving one field value against the schema.
    FieldMapping,
    /// Fetching the expanded record from the source.
    FetchRecord,
    /// Converting the record description.
    ConvertDescription,
    /// Creating the destination record.
    CreateRecord,
    /// Downloading attachment bytes to staging.
    DownloadAttachment,
    /// Uploading staged bytes to the destination.
    UploadAttachment,
    /// Building the comment rollup.
    AggregateComments,
    /// Posting the comment rollup.
    PostComment,
    /// Looking up a link target in the destination.
    LinkLookup,
    /// Appending a link value on the destination.
    LinkUpdate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FieldMapping => "field mapping",
            Self::FetchRecord => "fetch record",
            Self::ConvertDescription => "convert description",
            Self::CreateRecord => "create record",
            Self::DownloadAttachment => "download attachment",
            Self::UploadAttachment => "upload attachment",
            Self::AggregateComments => "aggregate comments",
            Self::PostComment => "post comment",
            Self::LinkLookup => "link lookup",
            Self::LinkUpdate => "link update",
        };
        f.write_str(name)
    }
}

/// One reported, non-fatal failure.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    /// Failure category.
    pub kind: FailureKind,
    /// Operation that failed.
    pub operation: Operation,
    /// Human key of the source record, when known.
    pub source_key: Option<String>,
    /// Destination field name, for field-level failures.
    pub field: Option<String>,
    /// Error message.
    pub message: String,
}

impl Failure {
    /// Builds a failure from an error, classifying it by kind.
    pub fn from_error(operation: Operation, error: &Error) -> Self {
        Self {
            kind: FailureKind::from(error),
            operation,
            source_key: None,
            field: None,
            message: error.to_string(),
        }
    }

    /// Attaches the source record key.
    #[must_use]
    pub fn with_source_key(mut self, key: impl Into<String>) -> Self {
        self.source_key = Some(key.into());
        self
    }

    /// Attaches the destination field name.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.operation)?;
        if let Some(key) = &self.source_key {
            write!(f, " {}", key)?;
        }
        if let Some(field) = &self.field {
            write!(f, " field '{}'", field)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Counters and failures accumulated over a run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct MigrationReport {
    /// Destination records created (top-level and children).
    pub records_created: u64,
    /// Records whose fetch or creation failed.
    pub records_failed: u64,
    /// Attachments uploaded.
    pub attachments_transferred: u64,
    /// Attachments that failed to download or upload.
    pub attachments_failed: u64,
    /// Comment rollups posted.
    pub comments_posted: u64,
    /// All reported failures in the order they happened.
    pub failures: Vec<Failure>,
}

impl MigrationReport {
    /// Records a failure and logs it.
    pub fn record(&mut self, failure: Failure) {
        warn!("{}", failure);
        self.failures.push(failure);
    }

    /// Number of failures of the given kind.
    pub fn count(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }

    /// Whether the run finished without any reported failure.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.records_failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_classification() {
        assert_eq!(
            FailureKind::from(&Error::SchemaFieldNotFound("x".into())),
            FailureKind::SchemaFieldNotFound
        );
        assert_eq!(
            FailureKind::from(&Error::ContentParse("bad".into())),
            FailureKind::ContentParse
        );
        assert_eq!(
            FailureKind::from(&Error::RateLimit(60)),
            FailureKind::Transport
        );
        assert_eq!(
            FailureKind::from(&Error::DestinationConnection("500".into())),
            FailureKind::Transport
        );
    }

    #[test]
    fn test_failure_display_includes_context() {
        let failure = Failure::from_error(
            Operation::FieldMapping,
            &Error::SchemaFieldNotFound("Sprint".into()),
        )
        .with_source_key("LE-12")
        .with_field("Sprint");

        let text = failure.to_string();
        assert!(text.starts_with("[field mapping] LE-12 field 'Sprint'"));
    }

    #[test]
    fn test_report_counts_by_kind() {
        let mut report = MigrationReport::default();
        assert!(report.is_clean());

        report.record(Failure::from_error(
            Operation::PostComment,
            &Error::DestinationConnection("boom".into()),
        ));
        report.record(Failure::from_error(
            Operation::AggregateComments,
            &Error::ContentParse("bad body".into()),
        ));

        assert_eq!(report.count(FailureKind::Transport), 1);
        assert_eq!(report.count(FailureKind::ContentParse), 1);
        assert_eq!(report.count(FailureKind::SchemaOptionNotFound), 0);
        assert!(!report.is_clean());
    }
}
