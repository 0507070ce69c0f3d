//! Configuration types for tracker-migrate.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use crate::connectors::common::validate_url;
use crate::error::{Error, Result};
use crate::links::LinkOptions;
use crate::mapper::{FieldMapping, SourceExtractor, TransformKind};
use crate::throttle::Throttle;

/// Largest page the source search API accepts.
pub const MAX_PAGE_SIZE: usize = 100;

/// Main migration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Source tracker configuration.
    pub source: SourceConfig,
    /// Destination tracker configuration.
    pub destination: DestinationConfig,
    /// Migration options.
    #[serde(default)]
    pub options: MigrationOptions,
    /// Ordered field mappings.
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
    /// Deferred link reconciliation settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<LinkOptions>,
}

/// Source tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceConfig {
    /// Jira Cloud (REST API v3).
    #[serde(rename = "jira")]
    Jira(JiraConfig),
}

/// Jira configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    /// Site URL (e.g. `https://acme.atlassian.net`).
    pub url: String,
    /// JQL selecting the top-level issues to migrate.
    pub query: String,
    /// Raw `Authorization` header value (e.g. `Basic ...`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,
    /// Account email, used with `api_token`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// API token, used with `email`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

/// Destination tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DestinationConfig {
    /// ClickUp (REST API v2).
    #[serde(rename = "clickup")]
    ClickUp(ClickUpConfig),
}

/// ClickUp configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickUpConfig {
    /// Personal API token.
    pub api_key: String,
    /// List receiving the migrated tasks.
    pub list_id: String,
    /// Workspace (team) id, required for searches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    /// API base URL.
    #[serde(default = "default_clickup_base_url")]
    pub base_url: String,
}

/// Migration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Records per source page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Offset of the first page (resume point of an aborted run).
    #[serde(default)]
    pub start_offset: usize,
    /// Delay before each fetch, download and destination write.
    #[serde(default = "default_operation_delay_ms")]
    pub operation_delay_ms: u64,
    /// Directory staging attachment bytes.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    /// Dry run mode (don't write to destination).
    #[serde(default)]
    pub dry_run: bool,
    /// Where to write the source id → destination id mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_map_path: Option<PathBuf>,
    /// Per-request timeout. Unset means requests may wait indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// Source status → destination status renames.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub status_mapping: HashMap<String, String>,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            start_offset: 0,
            operation_delay_ms: default_operation_delay_ms(),
            staging_dir: default_staging_dir(),
            dry_run: false,
            id_map_path: None,
            request_timeout_secs: None,
            status_mapping: HashMap::new(),
        }
    }
}

impl MigrationOptions {
    /// Throttle built from `operation_delay_ms`.
    pub fn throttle(&self) -> Throttle {
        Throttle::from_millis(self.operation_delay_ms)
    }

    /// Request timeout, if configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

fn default_operation_delay_ms() -> u64 {
    3000
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("./temp")
}

fn default_clickup_base_url() -> String {
    "https://api.clickup.com/api/v2".to_string()
}

impl MigrationConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.options.page_size) {
            return Err(Error::Config(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        match &self.source {
            SourceConfig::Jira(jira) => {
                validate_url(&jira.url)?;
                if jira.query.trim().is_empty() {
                    return Err(Error::Config("source query cannot be empty".to_string()));
                }
                let has_token = jira.email.is_some() && jira.api_token.is_some();
                if jira.authorization.is_none() && !has_token {
                    return Err(Error::Config(
                        "Jira needs either authorization or email + api_token".to_string(),
                    ));
                }
            }
        }

        match &self.destination {
            DestinationConfig::ClickUp(clickup) => {
                validate_url(&clickup.base_url)?;
                if clickup.list_id.trim().is_empty() {
                    return Err(Error::Config("list_id cannot be empty".to_string()));
                }
                if clickup.api_key.trim().is_empty() {
                    return Err(Error::Config("api_key cannot be empty".to_string()));
                }
                if self.links.is_some() && clickup.team_id.is_none() {
                    return Err(Error::Config(
                        "team_id is required for link reconciliation".to_string(),
                    ));
                }
            }
        }

        let mut seen = HashSet::new();
        for mapping in &self.fields {
            if !seen.insert(mapping.destination.as_str()) {
                return Err(Error::Config(format!(
                    "destination field '{}' is mapped more than once",
                    mapping.destination
                )));
            }
        }

        Ok(())
    }

    /// Starter configuration with the usual Jira → ClickUp field set.
    pub fn template() -> Self {
        use SourceExtractor::{Empty, Id, Key, Links, Title};
        use TransformKind::{Date, MultiSelect, Passthrough, RichText, SingleSelect};

        let field = |name: &str| SourceExtractor::Field(name.to_string());
        let fields = vec![
            FieldMapping::new("Development Team", field("customfield_13200"), SingleSelect),
            FieldMapping::new("Priority", field("priority"), SingleSelect),
            FieldMapping::new("Issue Type", field("issuetype"), SingleSelect),
            FieldMapping::new("Created", field("created"), Date),
            FieldMapping::new("Incident End", field("customfield_13403"), Date),
            FieldMapping::new("Incident Start", field("customfield_13402"), Date),
            FieldMapping::new("Updated", field("updated"), Date),
            FieldMapping::new("Jira Issue Key", Key, Passthrough),
            FieldMapping::new("Jira Assignee", field("assignee"), Passthrough),
            FieldMapping::new("PM Assignee", field("customfield_10900"), Passthrough),
            FieldMapping::new("QA Assignee", Empty, Passthrough),
            FieldMapping::new("Jira Reporter", field("reporter"), Passthrough),
            FieldMapping::new("Resolution (New)", field("resolution"), Passthrough)
                .with_default("Unresolved"),
            FieldMapping::new("Sprint", field("customfield_10007"), Passthrough),
            FieldMapping::new("Story Points", field("customfield_10004"), Passthrough),
            FieldMapping::new("Summary", Title, Passthrough),
            FieldMapping::new("Client", field("customfield_10300"), MultiSelect),
            FieldMapping::new("Components", field("components"), MultiSelect),
            FieldMapping::new("Product", field("customfield_13300"), MultiSelect),
            FieldMapping::new("Required Documentation", field("customfield_13500"), MultiSelect),
            FieldMapping::new("Invoiceable Amount", field("customfield_13670"), Passthrough),
            FieldMapping::new("Root Cause", field("customfield_13400"), RichText),
            FieldMapping::new("Uptime Impact", field("customfield_13401"), Passthrough),
            FieldMapping::new("Epic Key", field("customfield_10008"), Passthrough),
            FieldMapping::new("Jira ID", Id, Passthrough),
            FieldMapping::new("Issue Links", Links, TransformKind::Links),
        ];

        Self {
            source: SourceConfig::Jira(JiraConfig {
                url: "https://your-site.atlassian.net".to_string(),
                query: "project = PROJ AND issuetype in standardIssueTypes() ORDER BY created ASC"
                    .to_string(),
                authorization: None,
                email: Some("you@example.com".to_string()),
                api_token: None,
            }),
            destination: DestinationConfig::ClickUp(ClickUpConfig {
                api_key: String::new(),
                list_id: "123456789".to_string(),
                team_id: Some("987654321".to_string()),
                base_url: default_clickup_base_url(),
            }),
            options: MigrationOptions {
                id_map_path: Some(PathBuf::from("./id_map.json")),
                ..MigrationOptions::default()
            },
            fields,
            links: Some(LinkOptions {
                links_field: "Issue Links".to_string(),
                match_field: "Jira ID".to_string(),
                relationship_field: "Related Tasks".to_string(),
                statuses: Vec::new(),
            }),
        }
    }
}
