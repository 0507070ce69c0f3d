//! Recursive record migration.
//!
//! One call to [`RecordMigrator::migrate`] creates a destination record and
//! then, strictly in sequence, transfers its attachments, posts its comment
//! rollup and migrates its children depth-first with the new record as their
//! parent. Nothing is rolled back: a failed child or attachment leaves the
//! already created parent in place.
//!
//! There is no deduplication. Migrating the same source record twice creates
//! two destination records.

use futures::future::BoxFuture;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::attachments::AttachmentTransfer;
use crate::comments;
use crate::connectors::{CreateRecordRequest, DestinationConnector, SourceConnector};
use crate::convert::{DescriptionConverter, PlainTextConverter};
use crate::error::{Error, Result};
use crate::mapper::FieldMapper;
use crate::model::SourceRecord;
use crate::report::{Failure, MigrationReport, Operation};
use crate::schema::DestinationSchema;
use crate::throttle::Throttle;

/// Source id → destination id for every record created in the run.
pub type IdMap = BTreeMap<String, String>;

/// What happened to one record and its subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Source key.
    pub source_key: String,
    /// Destination id assigned on creation.
    pub destination_id: String,
    /// Attachments uploaded.
    pub attachments_transferred: usize,
    /// Attachments that failed to download or upload.
    pub attachments_failed: usize,
    /// Whether a comment rollup was posted.
    pub comment_posted: bool,
    /// Outcomes of children created successfully, in source order.
    pub children: Vec<RecordOutcome>,
    /// Keys of children whose fetch or creation failed.
    pub failed_children: Vec<String>,
}

impl RecordOutcome {
    /// Number of destination records created in this subtree.
    pub fn records_created(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(RecordOutcome::records_created)
            .sum::<usize>()
    }
}

/// Migrates source records into the destination, one subtree at a time.
pub struct RecordMigrator<'a> {
    source: &'a dyn SourceConnector,
    destination: &'a dyn DestinationConnector,
    schema: &'a DestinationSchema,
    mapper: &'a FieldMapper,
    converter: &'a dyn DescriptionConverter,
    transfer: AttachmentTransfer,
    throttle: Throttle,
    status_mapping: HashMap<String, String>,
    report: MigrationReport,
    id_map: IdMap,
}

impl<'a> RecordMigrator<'a> {
    /// Creates a migrator with default throttle, staging directory and
    /// plain-text description conversion.
    pub fn new(
        source: &'a dyn SourceConnector,
        destination: &'a dyn DestinationConnector,
        schema: &'a DestinationSchema,
        mapper: &'a FieldMapper,
    ) -> Self {
        let throttle = Throttle::default();
        Self {
            source,
            destination,
            schema,
            mapper,
            converter: &PlainTextConverter,
            transfer: AttachmentTransfer::new("./temp", throttle),
            throttle,
            status_mapping: HashMap::new(),
            report: MigrationReport::default(),
            id_map: IdMap::new(),
        }
    }

    /// Sets the delay inserted before fetches and destination writes.
    #[must_use]
    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    /// Sets the attachment transfer (staging directory and its throttle).
    #[must_use]
    pub fn with_transfer(mut self, transfer: AttachmentTransfer) -> Self {
        self.transfer = transfer;
        self
    }

    /// Sets the description converter.
    #[must_use]
    pub fn with_converter(mut self, converter: &'a dyn DescriptionConverter) -> Self {
        self.converter = converter;
        self
    }

    /// Sets the source → destination status renames.
    #[must_use]
    pub fn with_status_mapping(mut self, mapping: HashMap<String, String>) -> Self {
        self.status_mapping = mapping;
        self
    }

    /// Counters and failures so far.
    pub fn report(&self) -> &MigrationReport {
        &self.report
    }

    /// Identifier mapping so far.
    pub fn id_map(&self) -> &IdMap {
        &self.id_map
    }

    /// Consumes the migrator, returning its report and identifier mapping.
    pub fn into_parts(self) -> (MigrationReport, IdMap) {
        (self.report, self.id_map)
    }

    /// Migrates `record` and its subtree under `parent`.
    ///
    /// # Errors
    ///
    /// Returns the error when the record itself could not be fetched or
    /// created. The failure has already been reported with the record key;
    /// callers only need to move on to the next sibling.
    pub fn migrate<'m>(
        &'m mut self,
        record: &'m SourceRecord,
        parent: Option<&'m str>,
    ) -> BoxFuture<'m, Result<RecordOutcome>> {
        Box::pin(async move {
            info!("Creating record: {}, {}", record.key, record.id);

            let expanded;
            let record = if record.expanded {
                record
            } else {
                self.throttle.pause("fetch record").await;
                match self.source.fetch_expanded(record).await {
                    Ok(full) => {
                        expanded = full;
                        &expanded
                    }
                    Err(e) => {
                        self.fail_record(Operation::FetchRecord, &record.key, &e);
                        return Err(e);
                    }
                }
            };

            let request = self.build_request(record, parent);

            self.throttle.pause("create record").await;
            let destination_id = match self.destination.create_record(&request).await {
                Ok(id) => id,
                Err(e) => {
                    self.fail_record(Operation::CreateRecord, &record.key, &e);
                    return Err(e);
                }
            };
            info!("{},{}: created {}", record.key, record.id, destination_id);
            self.report.records_created += 1;
            self.id_map
                .insert(record.id.clone(), destination_id.clone());

            let mut outcome = RecordOutcome {
                source_key: record.key.clone(),
                destination_id: destination_id.clone(),
                ..Default::default()
            };

            for asset in &record.attachments {
                match self
                    .transfer
                    .transfer(self.source, self.destination, asset, &destination_id)
                    .await
                {
                    Ok(()) => {
                        outcome.attachments_transferred += 1;
                        self.report.attachments_transferred += 1;
                    }
                    Err(failure) => {
                        outcome.attachments_failed += 1;
                        self.report.attachments_failed += 1;
                        self.report
                            .record(failure.into_failure(asset).with_source_key(&record.key));
                    }
                }
            }

            outcome.comment_posted = self.post_comments(record, &destination_id).await;

            for child in &record.children {
                debug!("{}: migrating child {}", record.key, child.key);
                match self.migrate(child, Some(&destination_id)).await {
                    Ok(child_outcome) => outcome.children.push(child_outcome),
                    Err(_) => outcome.failed_children.push(child.key.clone()),
                }
            }

            Ok(outcome)
        })
    }

    fn build_request(&mut self, record: &SourceRecord, parent: Option<&str>) -> CreateRecordRequest {
        let description = match &record.description {
            Some(doc) => self.converter.convert(doc).unwrap_or_else(|e| {
                self.report.record(
                    Failure::from_error(Operation::ConvertDescription, &e)
                        .with_source_key(&record.key),
                );
                String::new()
            }),
            None => String::new(),
        };

        let mut fields = self.mapper.map(record, self.schema);
        for failure in std::mem::take(&mut fields.failures) {
            self.report.record(failure.with_source_key(&record.key));
        }

        let status = record.status.as_ref().map(|s| {
            self.status_mapping
                .get(s)
                .cloned()
                .unwrap_or_else(|| s.clone())
        });

        CreateRecordRequest {
            title: record.title.clone(),
            description,
            status,
            parent: parent.map(str::to_string),
            fields,
        }
    }

    async fn post_comments(&mut self, record: &SourceRecord, destination_id: &str) -> bool {
        let rollup = comments::aggregate(&record.comments);
        for failure in rollup.failures.iter().cloned() {
            self.report.record(failure.with_source_key(&record.key));
        }
        if rollup.is_empty() {
            return false;
        }

        self.throttle.pause("post comment").await;
        match self.destination.post_comment(destination_id, &rollup.text).await {
            Ok(()) => {
                self.report.comments_posted += 1;
                true
            }
            Err(e) => {
                self.report.record(
                    Failure::from_error(Operation::PostComment, &e).with_source_key(&record.key),
                );
                false
            }
        }
    }

    fn fail_record(&mut self, operation: Operation, key: &str, error: &Error) {
        self.report.records_failed += 1;
        self.report
            .record(Failure::from_error(operation, error).with_source_key(key));
    }
}
