// Migration tool - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # Tracker Migration Tool
//!
//! `tracker-migrate` is a CLI tool and library for migrating issue trees from
//! one tracker into another, preserving the parent/child structure, custom
//! fields, comments and attachments.
//!
//! ## Supported Trackers
//!
//! | Side | Tracker | Notes |
//! |------|---------|-------|
//! | Source | Jira Cloud | REST API v3, JQL selection |
//! | Destination | ClickUp | REST API v2, one list |
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a starter configuration
//! tracker-migrate init --output migration.yaml
//!
//! # Check field mappings against the destination without writing
//! tracker-migrate run --config migration.yaml --dry-run
//!
//! # Migrate, then resolve cross-record links
//! tracker-migrate run --config migration.yaml
//! tracker-migrate links --config migration.yaml
//! ```
//!
//! ## Configuration Example
//!
//! ```yaml
//! source:
//!   type: jira
//!   url: https://acme.atlassian.net
//!   query: project = OPS ORDER BY created ASC
//!   email: me@acme.io
//!   api_token: ...
//!
//! destination:
//!   type: clickup
//!   api_key: pk_...
//!   list_id: "163664754"
//!
//! options:
//!   page_size: 100
//!   operation_delay_ms: 3000
//!
//! fields:
//!   - destination: Priority
//!     source: fields.priority
//!     transform: single_select
//!   - destination: Jira ID
//!     source: id
//! ```
//!
//! ## Execution Model
//!
//! Everything runs sequentially on one task with a fixed delay before each
//! remote write. Failures below the page level are reported and skipped; the
//! run never rolls back what it already created.

#![warn(missing_docs)]

pub mod attachments;
pub mod comments;
pub mod config;
pub mod connectors;
pub mod convert;
pub mod error;
pub mod links;
pub mod mapper;
pub mod migrator;
pub mod model;
pub mod pagination;
pub mod pipeline;
pub mod report;
pub mod richtext;
pub mod schema;
pub mod throttle;

pub use config::{MigrationConfig, MigrationOptions, SourceConfig};
pub use connectors::{DestinationConnector, SourceConnector};
pub use error::{Error, Result};
pub use links::{LinkOptions, LinkReconciler, LinkStats};
pub use mapper::{FieldMapper, FieldMapping};
pub use migrator::{IdMap, RecordMigrator, RecordOutcome};
pub use pipeline::{MigrationStats, Pipeline, RunSummary};
pub use report::{Failure, FailureKind, MigrationReport};
pub use schema::DestinationSchema;
