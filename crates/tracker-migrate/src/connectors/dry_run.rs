//! Dry-run destination wrapper.
//!
//! Reads (field catalog, searches) go to the real destination so mapping
//! problems still surface; writes are logged and skipped.

use async_trait::async_trait;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::connectors::{
    CreateRecordRequest, DestinationConnector, DestinationRecord, RawField, RecordQuery,
};
use crate::error::Result;

/// Destination that never writes.
pub struct DryRunDestination {
    inner: Box<dyn DestinationConnector>,
}

impl DryRunDestination {
    /// Wraps a real destination.
    pub fn new(inner: Box<dyn DestinationConnector>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl DestinationConnector for DryRunDestination {
    fn destination_type(&self) -> &'static str {
        self.inner.destination_type()
    }

    async fn list_fields(&self) -> Result<Vec<RawField>> {
        self.inner.list_fields().await
    }

    async fn create_record(&self, request: &CreateRecordRequest) -> Result<String> {
        let id = format!("dry-run-{}", Uuid::new_v4());
        info!(
            "[dry run] create '{}' (parent: {}, {} fields) -> {}",
            request.title,
            request.parent.as_deref().unwrap_or("none"),
            request.fields.entries.len(),
            id
        );
        Ok(id)
    }

    async fn upload_attachment(&self, record_id: &str, file_name: &str, path: &Path) -> Result<()> {
        info!(
            "[dry run] attach {} to {} from {}",
            file_name,
            record_id,
            path.display()
        );
        Ok(())
    }

    async fn post_comment(&self, record_id: &str, text: &str) -> Result<()> {
        info!("[dry run] comment on {} ({} chars)", record_id, text.len());
        Ok(())
    }

    async fn add_field_values(&self, record_id: &str, field_id: &str, values: &[String]) -> Result<()> {
        info!(
            "[dry run] add {:?} to field {} of {}",
            values, field_id, record_id
        );
        Ok(())
    }

    async fn search_records(&self, query: &RecordQuery, page: usize) -> Result<Vec<DestinationRecord>> {
        self.inner.search_records(query, page).await
    }
}
