//! In-memory connectors for pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracker_migrate::connectors::{
    ByteStream, CreateRecordRequest, DestinationConnector, DestinationFieldValue,
    DestinationRecord, FieldFilter, RawField, RawOption, RecordQuery, SourceConnector,
};
use tracker_migrate::model::{AttachmentRef, SourceComment, SourcePage, SourceRecord};
use tracker_migrate::{Error, Result};

/// Serves a flat record list by offset.
#[derive(Default)]
pub struct FakeSource {
    records: Vec<SourceRecord>,
    total: Option<u64>,
    expanded: HashMap<String, SourceRecord>,
    attachments: HashMap<String, Vec<u8>>,
    truncated: HashSet<String>,
    failing_fetch: HashSet<String>,
    failing_page: Option<usize>,
    pub page_requests: Mutex<Vec<(usize, usize)>>,
    pub expand_requests: Mutex<Vec<String>>,
    pub downloads: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new(records: Vec<SourceRecord>) -> Self {
        let total = Some(records.len() as u64);
        Self {
            records,
            total,
            ..Default::default()
        }
    }

    /// Full representation returned for `record.key`.
    pub fn with_expanded(mut self, record: SourceRecord) -> Self {
        self.expanded.insert(record.key.clone(), record);
        self
    }

    pub fn with_attachment(mut self, id: &str, content: &[u8]) -> Self {
        self.attachments.insert(id.to_string(), content.to_vec());
        self
    }

    /// Serves the first chunk of `content`, then a connection error.
    pub fn with_truncated_attachment(mut self, id: &str, content: &[u8]) -> Self {
        self.attachments.insert(id.to_string(), content.to_vec());
        self.truncated.insert(id.to_string());
        self
    }

    pub fn failing_fetch(mut self, key: &str) -> Self {
        self.failing_fetch.insert(key.to_string());
        self
    }

    pub fn failing_page_at(mut self, offset: usize) -> Self {
        self.failing_page = Some(offset);
        self
    }

    pub fn page_sizes(&self) -> Vec<usize> {
        let requests = self.page_requests.lock().unwrap();
        requests
            .iter()
            .map(|(offset, size)| {
                self.records
                    .len()
                    .saturating_sub(*offset)
                    .min(*size)
            })
            .collect()
    }
}

#[async_trait]
impl SourceConnector for FakeSource {
    fn source_type(&self) -> &'static str {
        "fake"
    }

    async fn fetch_page(&self, offset: usize, page_size: usize) -> Result<SourcePage> {
        self.page_requests.lock().unwrap().push((offset, page_size));
        if self.failing_page == Some(offset) {
            return Err(Error::SourceConnection("search unavailable".to_string()));
        }
        let records = self
            .records
            .iter()
            .skip(offset)
            .take(page_size)
            .cloned()
            .collect();
        Ok(SourcePage {
            records,
            total: self.total,
        })
    }

    async fn fetch_expanded(&self, record: &SourceRecord) -> Result<SourceRecord> {
        self.expand_requests.lock().unwrap().push(record.key.clone());
        if self.failing_fetch.contains(&record.key) {
            return Err(Error::SourceConnection(format!("{} not found", record.key)));
        }
        let mut full = self
            .expanded
            .get(&record.key)
            .cloned()
            .unwrap_or_else(|| record.clone());
        full.expanded = true;
        Ok(full)
    }

    async fn download_attachment(&self, attachment: &AttachmentRef) -> Result<ByteStream> {
        self.downloads.lock().unwrap().push(attachment.id.clone());
        match self.attachments.get(&attachment.id) {
            Some(content) => {
                let mut chunks: Vec<Result<Bytes>> = content
                    .chunks(4)
                    .map(|c| Ok(Bytes::copy_from_slice(c)))
                    .collect();
                if self.truncated.contains(&attachment.id) {
                    chunks.truncate(1);
                    chunks.push(Err(Error::SourceConnection(
                        "connection reset by peer".to_string(),
                    )));
                }
                Ok(stream::iter(chunks).boxed())
            }
            None => Err(Error::SourceConnection(format!(
                "attachment {} returned 404",
                attachment.id
            ))),
        }
    }
}

/// One recorded destination call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create {
        id: String,
        title: String,
        description: String,
        status: Option<String>,
        parent: Option<String>,
        fields: Vec<(String, Value)>,
    },
    Upload {
        record_id: String,
        file_name: String,
        content: Vec<u8>,
    },
    Comment {
        record_id: String,
        text: String,
    },
    AddValues {
        record_id: String,
        field_id: String,
        values: Vec<String>,
    },
}

/// Records every write and assigns sequential ids.
#[derive(Default)]
pub struct FakeDestination {
    fields: Vec<RawField>,
    fail_schema: bool,
    failing_titles: HashSet<String>,
    failing_uploads: HashSet<String>,
    failing_comments: bool,
    stored: Vec<DestinationRecord>,
    next_id: AtomicUsize,
    pub calls: Mutex<Vec<Call>>,
    pub searches: Mutex<Vec<(RecordQuery, usize)>>,
}

impl FakeDestination {
    pub fn new(fields: Vec<RawField>) -> Self {
        Self {
            fields,
            next_id: AtomicUsize::new(1),
            ..Default::default()
        }
    }

    pub fn failing_schema(mut self) -> Self {
        self.fail_schema = true;
        self
    }

    pub fn failing_create(mut self, title: &str) -> Self {
        self.failing_titles.insert(title.to_string());
        self
    }

    pub fn failing_upload(mut self, file_name: &str) -> Self {
        self.failing_uploads.insert(file_name.to_string());
        self
    }

    pub fn failing_comments(mut self) -> Self {
        self.failing_comments = true;
        self
    }

    /// Records already in the destination, served by searches.
    pub fn with_stored(mut self, records: Vec<DestinationRecord>) -> Self {
        self.stored = records;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn creates(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Create { .. }))
            .collect()
    }

    pub fn uploads(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Upload { .. }))
            .collect()
    }

    pub fn comments(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Comment { .. }))
            .collect()
    }
}

#[async_trait]
impl DestinationConnector for FakeDestination {
    fn destination_type(&self) -> &'static str {
        "fake"
    }

    async fn list_fields(&self) -> Result<Vec<RawField>> {
        if self.fail_schema {
            return Err(Error::DestinationConnection("field catalog unavailable".to_string()));
        }
        Ok(self.fields.clone())
    }

    async fn create_record(&self, request: &CreateRecordRequest) -> Result<String> {
        if self.failing_titles.contains(&request.title) {
            return Err(Error::DestinationConnection(format!(
                "rejected '{}'",
                request.title
            )));
        }
        let id = format!("task-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.calls.lock().unwrap().push(Call::Create {
            id: id.clone(),
            title: request.title.clone(),
            description: request.description.clone(),
            status: request.status.clone(),
            parent: request.parent.clone(),
            fields: request
                .fields
                .entries
                .iter()
                .map(|f| (f.field_id.clone(), f.value.to_json()))
                .collect(),
        });
        Ok(id)
    }

    async fn upload_attachment(&self, record_id: &str, file_name: &str, path: &Path) -> Result<()> {
        if self.failing_uploads.contains(file_name) {
            return Err(Error::DestinationConnection("upload rejected".to_string()));
        }
        let content = tokio::fs::read(path).await?;
        self.calls.lock().unwrap().push(Call::Upload {
            record_id: record_id.to_string(),
            file_name: file_name.to_string(),
            content,
        });
        Ok(())
    }

    async fn post_comment(&self, record_id: &str, text: &str) -> Result<()> {
        if self.failing_comments {
            return Err(Error::DestinationConnection("comment rejected".to_string()));
        }
        self.calls.lock().unwrap().push(Call::Comment {
            record_id: record_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn add_field_values(&self, record_id: &str, field_id: &str, values: &[String]) -> Result<()> {
        self.calls.lock().unwrap().push(Call::AddValues {
            record_id: record_id.to_string(),
            field_id: field_id.to_string(),
            values: values.to_vec(),
        });
        Ok(())
    }

    async fn search_records(&self, query: &RecordQuery, page: usize) -> Result<Vec<DestinationRecord>> {
        self.searches.lock().unwrap().push((query.clone(), page));
        if page > 0 {
            return Ok(Vec::new());
        }
        let found = self
            .stored
            .iter()
            .filter(|r| match &query.filter {
                FieldFilter::IsSet { field_id } => r.field_value(field_id).is_some(),
                FieldFilter::Equals { field_id, value } => {
                    r.field_value(field_id) == Some(&Value::String(value.clone()))
                }
            })
            .cloned()
            .collect();
        Ok(found)
    }
}

/// Lets a test keep a handle on a fake handed to a pipeline.
pub struct Shared<T>(pub Arc<T>);

#[async_trait]
impl SourceConnector for Shared<FakeSource> {
    fn source_type(&self) -> &'static str {
        self.0.source_type()
    }

    async fn fetch_page(&self, offset: usize, page_size: usize) -> Result<SourcePage> {
        self.0.fetch_page(offset, page_size).await
    }

    async fn fetch_expanded(&self, record: &SourceRecord) -> Result<SourceRecord> {
        self.0.fetch_expanded(record).await
    }

    async fn download_attachment(&self, attachment: &AttachmentRef) -> Result<ByteStream> {
        self.0.download_attachment(attachment).await
    }
}

#[async_trait]
impl DestinationConnector for Shared<FakeDestination> {
    fn destination_type(&self) -> &'static str {
        self.0.destination_type()
    }

    async fn list_fields(&self) -> Result<Vec<RawField>> {
        self.0.list_fields().await
    }

    async fn create_record(&self, request: &CreateRecordRequest) -> Result<String> {
        self.0.create_record(request).await
    }

    async fn upload_attachment(&self, record_id: &str, file_name: &str, path: &Path) -> Result<()> {
        self.0.upload_attachment(record_id, file_name, path).await
    }

    async fn post_comment(&self, record_id: &str, text: &str) -> Result<()> {
        self.0.post_comment(record_id, text).await
    }

    async fn add_field_values(&self, record_id: &str, field_id: &str, values: &[String]) -> Result<()> {
        self.0.add_field_values(record_id, field_id, values).await
    }

    async fn search_records(&self, query: &RecordQuery, page: usize) -> Result<Vec<DestinationRecord>> {
        self.0.search_records(query, page).await
    }
}

pub fn text_field(id: &str, name: &str) -> RawField {
    RawField {
        id: id.to_string(),
        name: name.to_string(),
        field_type: "short_text".to_string(),
        options: vec![],
    }
}

pub fn select_field(id: &str, name: &str, options: &[(&str, &str)]) -> RawField {
    RawField {
        id: id.to_string(),
        name: name.to_string(),
        field_type: "drop_down".to_string(),
        options: options
            .iter()
            .map(|(id, name)| RawOption {
                id: id.to_string(),
                name: Some(name.to_string()),
                label: None,
            })
            .collect(),
    }
}

pub fn label_field(id: &str, name: &str, options: &[(&str, &str)]) -> RawField {
    RawField {
        id: id.to_string(),
        name: name.to_string(),
        field_type: "labels".to_string(),
        options: options
            .iter()
            .map(|(id, label)| RawOption {
                id: id.to_string(),
                name: None,
                label: Some(label.to_string()),
            })
            .collect(),
    }
}

/// Rich-text document with one paragraph per entry.
pub fn doc(paragraphs: &[&str]) -> Value {
    let content: Vec<Value> = paragraphs
        .iter()
        .map(|p| json!({"type": "paragraph", "content": [{"type": "text", "text": p}]}))
        .collect();
    json!({"type": "doc", "version": 1, "content": content})
}

pub fn comment(author: &str, text: &str) -> SourceComment {
    SourceComment {
        author: author.to_string(),
        body: doc(&[text]),
    }
}

/// Already expanded record with no fields.
pub fn record(id: &str, key: &str, title: &str) -> SourceRecord {
    let mut record = SourceRecord::summary(id, key, title);
    record.expanded = true;
    record
}

pub fn attachment(id: &str, file_name: &str) -> AttachmentRef {
    AttachmentRef {
        id: id.to_string(),
        file_name: file_name.to_string(),
        size: None,
    }
}

pub fn stored_record(id: &str, fields: &[(&str, Value)]) -> DestinationRecord {
    DestinationRecord {
        id: id.to_string(),
        name: id.to_string(),
        custom_fields: fields
            .iter()
            .map(|(field_id, value)| DestinationFieldValue {
                id: field_id.to_string(),
                name: String::new(),
                value: Some(value.clone()),
            })
            .collect(),
    }
}
