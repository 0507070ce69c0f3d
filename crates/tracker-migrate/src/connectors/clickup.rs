//! ClickUp destination connector (REST API v2).
//!
//! Records become tasks in one list. Child records become sub-tasks through
//! the `parent` attribute, custom fields are written with the task, and
//! attachments are uploaded as multipart forms streamed from the staged file.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::config::ClickUpConfig;
use crate::connectors::common::{check_response, create_http_client, join_url, Side};
use crate::connectors::{
    CreateRecordRequest, DestinationConnector, DestinationRecord, FieldFilter, RawField,
    RawOption, RecordQuery,
};
use crate::error::{Error, Result};

const SERVICE: &str = "ClickUp";

#[derive(Debug, Deserialize)]
struct FieldsResponse {
    #[serde(default)]
    fields: Vec<FieldJson>,
}

#[derive(Debug, Deserialize)]
struct FieldJson {
    id: String,
    name: String,
    #[serde(rename = "type", default)]
    field_type: String,
    #[serde(default)]
    type_config: Option<TypeConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct TypeConfig {
    #[serde(default)]
    options: Vec<RawOption>,
}

#[derive(Debug, Serialize)]
struct CreateTask<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<&'a str>,
    notify_all: bool,
    check_required_custom_fields: bool,
    custom_fields: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CreatedTask {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TasksResponse {
    #[serde(default)]
    tasks: Vec<DestinationRecord>,
}

/// ClickUp connector.
pub struct ClickUpConnector {
    config: ClickUpConfig,
    client: Client,
}

impl ClickUpConnector {
    /// Creates a new ClickUp connector with a configured HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClickUpConfig, request_timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            config,
            client: create_http_client(request_timeout)?,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.config.base_url, path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(AUTHORIZATION, &self.config.api_key)
    }

    async fn send(&self, req: RequestBuilder) -> Result<reqwest::Response> {
        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| Error::DestinationConnection(format!("ClickUp request failed: {}", e)))?;
        check_response(response, SERVICE, Side::Destination).await
    }

    /// Query string for a team task search.
    fn search_params(&self, team_query: &RecordQuery, page: usize) -> Result<Vec<(String, String)>> {
        let mut params = vec![
            ("page".to_string(), page.to_string()),
            ("list_ids[]".to_string(), self.config.list_id.clone()),
            ("subtasks".to_string(), "true".to_string()),
        ];
        if team_query.statuses.is_empty() {
            params.push(("include_closed".to_string(), "true".to_string()));
        }
        for status in &team_query.statuses {
            params.push(("statuses[]".to_string(), status.clone()));
        }

        let filter = match &team_query.filter {
            FieldFilter::IsSet { field_id } => json!([{
                "field_id": field_id,
                "operator": "IS NOT NULL"
            }]),
            FieldFilter::Equals { field_id, value } => json!([{
                "field_id": field_id,
                "operator": "=",
                "value": value
            }]),
        };
        params.push(("custom_fields".to_string(), serde_json::to_string(&filter)?));
        Ok(params)
    }
}

#[async_trait]
impl DestinationConnector for ClickUpConnector {
    fn destination_type(&self) -> &'static str {
        "clickup"
    }

    async fn list_fields(&self) -> Result<Vec<RawField>> {
        let url = self.url(&format!("/list/{}/field", self.config.list_id));
        let response = self.send(self.client.get(url)).await?;
        let body: FieldsResponse = response.json().await.map_err(|e| {
            Error::DestinationConnection(format!("Failed to parse ClickUp fields: {}", e))
        })?;

        Ok(body
            .fields
            .into_iter()
            .map(|f| RawField {
                id: f.id,
                name: f.name,
                field_type: f.field_type,
                options: f.type_config.unwrap_or_default().options,
            })
            .collect())
    }

    async fn create_record(&self, request: &CreateRecordRequest) -> Result<String> {
        let body = CreateTask {
            name: &request.title,
            description: &request.description,
            status: request.status.as_deref(),
            parent: request.parent.as_deref(),
            notify_all: false,
            check_required_custom_fields: false,
            custom_fields: request
                .fields
                .entries
                .iter()
                .map(|f| json!({"id": f.field_id, "value": f.value.to_json()}))
                .collect(),
        };

        let url = self.url(&format!("/list/{}/task", self.config.list_id));
        let response = self.send(self.client.post(url).json(&body)).await?;
        let created: CreatedTask = response.json().await.map_err(|e| {
            Error::DestinationConnection(format!("Failed to parse created task: {}", e))
        })?;
        Ok(created.id)
    }

    async fn upload_attachment(&self, record_id: &str, file_name: &str, path: &Path) -> Result<()> {
        let file = tokio::fs::File::open(path).await?;
        let length = file.metadata().await?.len();
        let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
            .file_name(file_name.to_string());
        let form = Form::new()
            .text("filename", file_name.to_string())
            .part("attachment", part);

        let url = self.url(&format!("/task/{}/attachment", record_id));
        self.send(self.client.post(url).multipart(form)).await?;
        debug!("Uploaded {} ({} bytes) to {}", file_name, length, record_id);
        Ok(())
    }

    async fn post_comment(&self, record_id: &str, text: &str) -> Result<()> {
        let url = self.url(&format!("/task/{}/comment", record_id));
        let body = json!({"comment_text": text, "notify_all": false});
        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn add_field_values(&self, record_id: &str, field_id: &str, values: &[String]) -> Result<()> {
        let url = self.url(&format!("/task/{}/field/{}", record_id, field_id));
        let body = json!({"value": {"add": values}});
        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn search_records(&self, query: &RecordQuery, page: usize) -> Result<Vec<DestinationRecord>> {
        let team_id = self.config.team_id.as_deref().ok_or_else(|| {
            Error::Config("ClickUp team_id is required to search tasks".to_string())
        })?;
        let params = self.search_params(query, page)?;

        let url = self.url(&format!("/team/{}/task", team_id));
        let response = self.send(self.client.get(url).query(&params)).await?;
        let body: TasksResponse = response.json().await.map_err(|e| {
            Error::DestinationConnection(format!("Failed to parse ClickUp tasks: {}", e))
        })?;
        Ok(body.tasks)
    }
}

#[cfg(test)]
#[path = "clickup_tests.rs"]
mod tests;
