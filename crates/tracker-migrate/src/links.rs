//! Deferred link reconciliation.
//!
//! The migrator stores each record's linked source ids in a text field because
//! link targets may not exist yet when the record is created. Once the run has
//! finished, this pass walks the destination records carrying stored ids,
//! resolves every id to the destination record migrated from it and appends
//! that record to a relationship field.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::connectors::{DestinationConnector, DestinationRecord, FieldFilter, RecordQuery};
use crate::error::Result;
use crate::migrator::IdMap;
use crate::report::{Failure, Operation};
use crate::schema::DestinationSchema;
use crate::throttle::Throttle;

/// Which destination fields the reconciler reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOptions {
    /// Text field holding the stored source ids.
    pub links_field: String,
    /// Field holding each record's source id, used to find link targets.
    pub match_field: String,
    /// Relationship field receiving the resolved targets.
    pub relationship_field: String,
    /// Only scan records in these statuses (empty = any).
    #[serde(default)]
    pub statuses: Vec<String>,
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct LinkStats {
    /// Search pages fetched (including the final empty one).
    pub pages: usize,
    /// Records carrying stored ids.
    pub records_scanned: usize,
    /// Relationship values appended.
    pub links_added: usize,
    /// Source ids with no destination counterpart, as `record -> id`.
    pub unresolved: Vec<String>,
    /// Failed lookups and updates.
    pub failures: Vec<Failure>,
}

/// Resolves stored link ids into destination relationships.
pub struct LinkReconciler<'a> {
    destination: &'a dyn DestinationConnector,
    options: &'a LinkOptions,
    id_map: Option<&'a IdMap>,
    throttle: Throttle,
}

struct FieldIds {
    links: String,
    matched: String,
    relationship: String,
}

impl<'a> LinkReconciler<'a> {
    /// Creates a reconciler.
    pub fn new(destination: &'a dyn DestinationConnector, options: &'a LinkOptions) -> Self {
        Self {
            destination,
            options,
            id_map: None,
            throttle: Throttle::default(),
        }
    }

    /// Resolves ids through a run's identifier mapping before searching.
    #[must_use]
    pub fn with_id_map(mut self, id_map: &'a IdMap) -> Self {
        self.id_map = Some(id_map);
        self
    }

    /// Sets the delay inserted before each update.
    #[must_use]
    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    /// Runs the pass over every matching destination record.
    ///
    /// # Errors
    ///
    /// Schema load failures, unknown configured fields and search page
    /// failures abort the pass. Per-link failures are collected in the
    /// returned stats.
    pub async fn run(&self) -> Result<LinkStats> {
        let schema = DestinationSchema::load(self.destination).await?;
        let ids = FieldIds {
            links: schema.field_id(&self.options.links_field)?.to_string(),
            matched: schema.field_id(&self.options.match_field)?.to_string(),
            relationship: schema.field_id(&self.options.relationship_field)?.to_string(),
        };

        let query = RecordQuery {
            statuses: self.options.statuses.clone(),
            filter: FieldFilter::IsSet {
                field_id: ids.links.clone(),
            },
        };

        let mut stats = LinkStats::default();
        let mut page = 0;
        loop {
            let records = self.destination.search_records(&query, page).await?;
            stats.pages += 1;
            if records.is_empty() {
                info!("Page {} is empty, link pass complete", page);
                break;
            }
            info!("Page = {}: {} records with stored links", page, records.len());

            for record in &records {
                self.reconcile(record, &ids, &mut stats).await;
            }
            page += 1;
        }

        Ok(stats)
    }

    async fn reconcile(&self, record: &DestinationRecord, ids: &FieldIds, stats: &mut LinkStats) {
        let stored = match record.field_value(&ids.links) {
            Some(value) => parse_link_ids(value),
            None => return,
        };
        stats.records_scanned += 1;

        for source_id in stored {
            let target = match self.resolve(&source_id, &ids.matched).await {
                Ok(Some(target)) => target,
                Ok(None) => {
                    warn!("Could not find record migrated from {}", source_id);
                    stats.unresolved.push(format!("{} -> {}", record.id, source_id));
                    continue;
                }
                Err(e) => {
                    stats.failures.push(
                        Failure::from_error(Operation::LinkLookup, &e).with_source_key(&source_id),
                    );
                    continue;
                }
            };
            if target == record.id {
                debug!("Skipping self link on {}", record.id);
                continue;
            }

            self.throttle.pause("link update").await;
            match self
                .destination
                .add_field_values(&record.id, &ids.relationship, std::slice::from_ref(&target))
                .await
            {
                Ok(()) => {
                    info!("Linked {} to {}", target, record.id);
                    stats.links_added += 1;
                }
                Err(e) => stats.failures.push(
                    Failure::from_error(Operation::LinkUpdate, &e)
                        .with_source_key(&source_id)
                        .with_field(&self.options.relationship_field),
                ),
            }
        }
    }

    async fn resolve(&self, source_id: &str, match_field_id: &str) -> Result<Option<String>> {
        if let Some(target) = self.id_map.and_then(|map| map.get(source_id)) {
            return Ok(Some(target.clone()));
        }

        let query = RecordQuery {
            statuses: Vec::new(),
            filter: FieldFilter::Equals {
                field_id: match_field_id.to_string(),
                value: source_id.to_string(),
            },
        };
        let found = self.destination.search_records(&query, 0).await?;
        Ok(found.into_iter().next().map(|r| r.id))
    }
}

/// Extracts stored source ids from a links field value.
///
/// Accepts a JSON array serialized as text (what the migrator writes), a bare
/// id string, a number or an array.
pub fn parse_link_ids(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Vec::new();
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(parsed @ Value::Array(_)) => parse_link_ids(&parsed),
                _ => vec![trimmed.to_string()],
            }
        }
        Value::Number(n) => vec![n.to_string()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
