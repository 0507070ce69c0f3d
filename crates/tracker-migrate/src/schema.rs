//! Destination schema snapshot and name → identifier resolution.
//!
//! The snapshot is loaded once per run and passed explicitly to whoever needs
//! it. It is never refetched mid-run, even for long migrations.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::connectors::{DestinationConnector, RawField, RawOption};
use crate::error::{Error, Result};
use crate::report::{Failure, Operation};

/// One allowed value of an enumerated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOption {
    /// Option identifier.
    pub id: String,
    /// Text matched against source labels.
    pub text: String,
}

/// Option catalog of a field, keyed the way the destination keys it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OptionSet {
    /// Field is not enumerated, or lists no options.
    #[default]
    None,
    /// Options matched by their `label` (label-style fields).
    Labeled(Vec<FieldOption>),
    /// Options matched by their `name` (drop-down style fields).
    Named(Vec<FieldOption>),
}

impl OptionSet {
    /// Detects the option representation from the first entry.
    fn from_raw(options: &[RawOption]) -> Self {
        let Some(first) = options.first() else {
            return Self::None;
        };

        if first.label.is_some() {
            Self::Labeled(
                options
                    .iter()
                    .filter_map(|o| {
                        o.label.as_ref().map(|text| FieldOption {
                            id: o.id.clone(),
                            text: text.clone(),
                        })
                    })
                    .collect(),
            )
        } else {
            Self::Named(
                options
                    .iter()
                    .filter_map(|o| {
                        o.name.as_ref().map(|text| FieldOption {
                            id: o.id.clone(),
                            text: text.clone(),
                        })
                    })
                    .collect(),
            )
        }
    }

    /// All options, regardless of representation.
    pub fn options(&self) -> &[FieldOption] {
        match self {
            Self::None => &[],
            Self::Labeled(options) | Self::Named(options) => options,
        }
    }

    fn find(&self, label: &str) -> Option<&FieldOption> {
        self.options().iter().find(|o| o.text == label)
    }
}

/// A destination field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    /// Field identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Destination field type.
    pub field_type: String,
    /// Allowed values.
    pub options: OptionSet,
}

/// Read-only snapshot of the destination field catalog.
#[derive(Debug, Clone, Default)]
pub struct DestinationSchema {
    fields: Vec<SchemaField>,
    by_name: HashMap<String, usize>,
}

impl DestinationSchema {
    /// Fetches the field catalog from the destination.
    ///
    /// # Errors
    ///
    /// Any transport failure is fatal: no mapping can proceed without the
    /// schema.
    pub async fn load(destination: &dyn DestinationConnector) -> Result<Self> {
        let raw = destination.list_fields().await?;
        let schema = Self::from_fields(raw);
        info!(
            "Loaded destination schema from {}: {} fields",
            destination.destination_type(),
            schema.len()
        );
        Ok(schema)
    }

    /// Builds a snapshot from raw fields.
    ///
    /// Field names are unique as observed here: a later duplicate is ignored.
    pub fn from_fields(raw: Vec<RawField>) -> Self {
        let mut schema = Self::default();

        for field in raw {
            if schema.by_name.contains_key(&field.name) {
                warn!(
                    "Duplicate destination field name '{}' (id {}), keeping the first",
                    field.name, field.id
                );
                continue;
            }
            let options = OptionSet::from_raw(&field.options);
            debug!(
                "Schema field '{}' ({}) with {} options",
                field.name,
                field.field_type,
                options.options().len()
            );
            schema.by_name.insert(field.name.clone(), schema.fields.len());
            schema.fields.push(SchemaField {
                id: field.id,
                name: field.name,
                field_type: field.field_type,
                options,
            });
        }

        schema
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All fields in catalog order.
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Result<&SchemaField> {
        self.by_name
            .get(name)
            .map(|&idx| &self.fields[idx])
            .ok_or_else(|| Error::SchemaFieldNotFound(name.to_string()))
    }

    /// Identifier of the field with the given name.
    pub fn field_id(&self, name: &str) -> Result<&str> {
        self.field(name).map(|f| f.id.as_str())
    }

    /// Identifier of the option of `field_name` whose text equals `label`.
    pub fn option_id(&self, field_name: &str, label: &str) -> Result<&str> {
        let field = self.field(field_name)?;
        field
            .options
            .find(label)
            .map(|o| o.id.as_str())
            .ok_or_else(|| Error::SchemaOptionNotFound {
                field: field_name.to_string(),
                label: label.to_string(),
            })
    }
}

/// Schema lookups that never fail: misses become `None` plus exactly one
/// recorded [`Failure`].
#[derive(Debug)]
pub struct SchemaResolver<'s> {
    schema: &'s DestinationSchema,
    failures: Vec<Failure>,
}

impl<'s> SchemaResolver<'s> {
    /// Creates a resolver over a snapshot.
    pub fn new(schema: &'s DestinationSchema) -> Self {
        Self {
            schema,
            failures: Vec::new(),
        }
    }

    /// Field id for `name`, or `None` with a `SchemaFieldNotFound` failure.
    pub fn field_id(&mut self, name: &str) -> Option<String> {
        match self.schema.field_id(name) {
            Ok(id) => Some(id.to_string()),
            Err(e) => {
                self.fail(name, &e);
                None
            }
        }
    }

    /// Option id for `label` on `field_name`, or `None` with one failure.
    pub fn option_id(&mut self, field_name: &str, label: &str) -> Option<String> {
        match self.schema.option_id(field_name, label) {
            Ok(id) => Some(id.to_string()),
            Err(e) => {
                self.fail(field_name, &e);
                None
            }
        }
    }

    /// Records a failure against a field.
    pub fn fail(&mut self, field_name: &str, error: &Error) {
        self.failures
            .push(Failure::from_error(Operation::FieldMapping, error).with_field(field_name));
    }

    /// Failures recorded so far.
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    /// Consumes the resolver, returning its failures.
    pub fn into_failures(self) -> Vec<Failure> {
        self.failures
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
