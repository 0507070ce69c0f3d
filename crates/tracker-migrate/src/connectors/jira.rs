//! Jira Cloud source connector (REST API v3).
//!
//! Top-level issues are paged with a JQL search that only asks for the summary
//! and status. Each issue is then fetched in full, which brings its
//! description, comments, attachments, sub-tasks and issue links. Sub-tasks
//! arrive as summaries and are expanded when the migrator reaches them.

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::config::JiraConfig;
use crate::connectors::common::{check_response, create_http_client, join_url, Side};
use crate::connectors::{ByteStream, SourceConnector};
use crate::error::{Error, Result};
use crate::mapper::parse_timestamp;
use crate::model::{
    AttachmentRef, FieldValue, LinkDirection, LinkRef, SourceComment, SourcePage, SourceRecord,
};

const SERVICE: &str = "Jira";

/// Issue fields turned into dedicated record members instead of field map
/// entries.
const STRUCTURAL_FIELDS: &[&str] = &[
    "summary",
    "description",
    "status",
    "comment",
    "attachment",
    "subtasks",
    "issuelinks",
];

/// Object keys tried, in order, to read the label of an option-like value.
const LABEL_KEYS: &[&str] = &["value", "name", "displayName", "key"];

/// Search request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    jql: &'a str,
    start_at: usize,
    max_results: usize,
    fields: [&'static str; 2],
}

/// Search response.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    issues: Vec<Issue>,
}

/// An issue as returned by search, issue and sub-task listings.
#[derive(Debug, Deserialize)]
struct Issue {
    id: String,
    key: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Jira connector.
pub struct JiraConnector {
    config: JiraConfig,
    client: Client,
}

impl JiraConnector {
    /// Creates a new Jira connector with a configured HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: JiraConfig, request_timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            config,
            client: create_http_client(request_timeout)?,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.config.url, path)
    }

    /// Applies the configured credentials.
    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        if let Some(raw) = &self.config.authorization {
            req.header(AUTHORIZATION, raw)
        } else if let (Some(email), Some(token)) = (&self.config.email, &self.config.api_token) {
            req.basic_auth(email, Some(token))
        } else {
            req
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<reqwest::Response> {
        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| Error::SourceConnection(format!("Jira request failed: {}", e)))?;
        check_response(response, SERVICE, Side::Source).await
    }
}

#[async_trait]
impl SourceConnector for JiraConnector {
    fn source_type(&self) -> &'static str {
        "jira"
    }

    async fn fetch_page(&self, offset: usize, page_size: usize) -> Result<SourcePage> {
        let body = SearchRequest {
            jql: &self.config.query,
            start_at: offset,
            max_results: page_size,
            fields: ["summary", "status"],
        };
        let response = self
            .send(self.client.post(self.url("/rest/api/3/search")).json(&body))
            .await?;
        let search: SearchResponse = response.json().await.map_err(|e| {
            Error::SourceConnection(format!("Failed to parse Jira search response: {}", e))
        })?;

        debug!(
            "Jira search at {} returned {} issues",
            offset,
            search.issues.len()
        );
        Ok(SourcePage {
            records: search
                .issues
                .into_iter()
                .map(|issue| issue_to_record(issue, false))
                .collect(),
            total: search.total,
        })
    }

    async fn fetch_expanded(&self, record: &SourceRecord) -> Result<SourceRecord> {
        let url = self.url(&format!("/rest/api/3/issue/{}", record.key));
        let response = self
            .send(self.client.get(url).query(&[("expand", "renderedFields")]))
            .await?;
        let issue: Issue = response.json().await.map_err(|e| {
            Error::SourceConnection(format!("Failed to parse Jira issue {}: {}", record.key, e))
        })?;
        Ok(issue_to_record(issue, true))
    }

    async fn download_attachment(&self, attachment: &AttachmentRef) -> Result<ByteStream> {
        let url = self.url(&format!("/rest/api/3/attachment/content/{}", attachment.id));
        let response = self.send(self.client.get(url)).await?;
        Ok(response.bytes_stream().map_err(Error::from).boxed())
    }
}

/// Builds a record from an issue payload.
///
/// Summaries only carry title and status; `expanded` issues also yield
/// description, comments, attachments, sub-tasks and links.
fn issue_to_record(issue: Issue, expanded: bool) -> SourceRecord {
    let Issue { id, key, fields } = issue;
    let mut record = SourceRecord::summary(
        id,
        key,
        fields
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default(),
    );
    record.status = fields
        .get("status")
        .and_then(|s| s.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string);
    record.expanded = expanded;

    if !expanded {
        return record;
    }

    record.description = fields.get("description").filter(|v| !v.is_null()).cloned();
    record.comments = comments_of(&fields);
    record.attachments = attachments_of(&fields);
    record.children = fields
        .get("subtasks")
        .and_then(Value::as_array)
        .map(|subtasks| {
            subtasks
                .iter()
                .filter_map(|s| serde_json::from_value::<Issue>(s.clone()).ok())
                .map(|s| issue_to_record(s, false))
                .collect()
        })
        .unwrap_or_default();
    record.links = links_of(&fields);
    record.fields = fields
        .iter()
        .filter(|(name, _)| !STRUCTURAL_FIELDS.contains(&name.as_str()))
        .filter_map(|(name, value)| convert_field(value).map(|v| (name.clone(), v)))
        .collect::<BTreeMap<_, _>>();

    record
}

fn comments_of(fields: &Map<String, Value>) -> Vec<SourceComment> {
    fields
        .get("comment")
        .and_then(|c| c.get("comments"))
        .and_then(Value::as_array)
        .map(|comments| {
            comments
                .iter()
                .map(|c| SourceComment {
                    author: c
                        .get("author")
                        .and_then(|a| a.get("displayName"))
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown")
                        .to_string(),
                    body: c.get("body").cloned().unwrap_or(Value::Null),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn attachments_of(fields: &Map<String, Value>) -> Vec<AttachmentRef> {
    fields
        .get("attachment")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|a| {
                    Some(AttachmentRef {
                        id: id_string(a.get("id")?)?,
                        file_name: a.get("filename")?.as_str()?.to_string(),
                        size: a.get("size").and_then(Value::as_u64),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Outward then inward issue of each link, in link order.
fn links_of(fields: &Map<String, Value>) -> Vec<LinkRef> {
    let Some(links) = fields.get("issuelinks").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut refs = Vec::new();
    for link in links {
        for (side, direction) in [
            ("outwardIssue", LinkDirection::Outward),
            ("inwardIssue", LinkDirection::Inward),
        ] {
            if let Some(issue) = link.get(side) {
                if let Some(id) = issue.get("id").and_then(id_string) {
                    refs.push(LinkRef {
                        direction,
                        id,
                        key: issue
                            .get("key")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    });
                }
            }
        }
    }
    refs
}

/// Ids come back as strings, but tolerate numbers.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Converts a raw Jira field value into a typed field value.
///
/// Returns `None` for empty values and shapes with no usable content.
pub fn convert_field(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(FieldValue::Text(b.to_string())),
        Value::Number(n) => Some(FieldValue::Number(n.clone())),
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(match looks_like_timestamp(s).then(|| parse_timestamp(s)).flatten() {
            Some(ts) => FieldValue::Date(ts),
            None => FieldValue::Text(s.clone()),
        }),
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("doc") {
                Some(FieldValue::Document(value.clone()))
            } else {
                label_of(value).map(FieldValue::Enum)
            }
        }
        Value::Array(items) if items.is_empty() => None,
        Value::Array(items) => {
            if items.iter().all(is_issue_ref) {
                Some(FieldValue::References(
                    items.iter().filter_map(|i| i.get("id").and_then(id_string)).collect(),
                ))
            } else {
                let labels: Vec<String> = items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        other => label_of(other),
                    })
                    .collect();
                (!labels.is_empty()).then_some(FieldValue::EnumList(labels))
            }
        }
    }
}

fn label_of(value: &Value) -> Option<String> {
    LABEL_KEYS
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

/// Issue references carry `id` and `key` but no option label.
fn is_issue_ref(value: &Value) -> bool {
    value.get("id").is_some()
        && value.get("key").is_some()
        && value.get("name").is_none()
        && value.get("value").is_none()
}

/// Cheap shape check so plain text like "2024" stays text.
fn looks_like_timestamp(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[7] == b'-'
}

#[cfg(test)]
#[path = "jira_tests.rs"]
mod tests;
