//! Tests for field mapping.

use super::*;
use crate::connectors::{RawField, RawOption};
use crate::model::{LinkDirection, LinkRef};
use crate::report::FailureKind;
use serde_json::json;

fn option(id: &str, name: &str) -> RawOption {
    RawOption {
        id: id.to_string(),
        name: Some(name.to_string()),
        label: None,
    }
}

fn label(id: &str, label: &str) -> RawOption {
    RawOption {
        id: id.to_string(),
        name: None,
        label: Some(label.to_string()),
    }
}

fn field(id: &str, name: &str, options: Vec<RawOption>) -> RawField {
    RawField {
        id: id.to_string(),
        name: name.to_string(),
        field_type: String::new(),
        options,
    }
}

fn test_schema() -> DestinationSchema {
    DestinationSchema::from_fields(vec![
        field("f-key", "Jira Issue Key", vec![]),
        field("f-points", "Story Points", vec![]),
        field("f-created", "Created", vec![]),
        field("f-priority", "Priority", vec![option("p-high", "High"), option("p-low", "Low")]),
        field(
            "f-product",
            "Product",
            vec![label("pr-a", "Alpha"), label("pr-b", "Beta"), label("pr-c", "Gamma")],
        ),
        field("f-links", "Issue Links", vec![]),
        field("f-root", "Root Cause", vec![]),
        field("f-resolution", "Resolution (New)", vec![]),
        field("f-sprint", "Sprint", vec![]),
    ])
}

fn test_record() -> SourceRecord {
    let mut record = SourceRecord::summary("10001", "LE-7", "Broken login");
    record.status = Some("closed".to_string());
    record
        .fields
        .insert("priority".to_string(), FieldValue::Enum("High".to_string()));
    record
        .fields
        .insert("customfield_10004".to_string(), FieldValue::Number(5.into()));
    record.fields.insert(
        "created".to_string(),
        FieldValue::Text("2023-02-01T10:00:00.000+0000".to_string()),
    );
    record.fields.insert(
        "customfield_13300".to_string(),
        FieldValue::EnumList(vec![
            "Alpha".to_string(),
            "Unknown".to_string(),
            "Gamma".to_string(),
        ]),
    );
    record.fields.insert(
        "customfield_10007".to_string(),
        FieldValue::EnumList(vec!["Sprint 4".to_string(), "Sprint 5".to_string()]),
    );
    record
}

#[test]
fn test_source_extractor_parse() {
    assert_eq!("key".parse::<SourceExtractor>().unwrap(), SourceExtractor::Key);
    assert_eq!(
        "fields.customfield_1".parse::<SourceExtractor>().unwrap(),
        SourceExtractor::Field("customfield_1".to_string())
    );
    assert_eq!("none".parse::<SourceExtractor>().unwrap(), SourceExtractor::Empty);
    assert!("fields.".parse::<SourceExtractor>().is_err());
    assert!("summary".parse::<SourceExtractor>().is_err());
}

#[test]
fn test_field_mapping_yaml() {
    let yaml = r#"
- destination: Priority
  source: fields.priority
  transform: single_select
- destination: Jira Issue Key
  source: key
- destination: Resolution (New)
  source: fields.resolution
  default: Unresolved
"#;
    let mappings: Vec<FieldMapping> = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(mappings.len(), 3);
    assert_eq!(mappings[0].transform, TransformKind::SingleSelect);
    assert_eq!(mappings[1].transform, TransformKind::Passthrough);
    assert_eq!(mappings[2].default.as_deref(), Some("Unresolved"));
}

#[test]
fn test_scalar_passthrough() {
    let mapper = FieldMapper::new(vec![
        FieldMapping::new("Jira Issue Key", SourceExtractor::Key, TransformKind::Passthrough),
        FieldMapping::new(
            "Story Points",
            SourceExtractor::Field("customfield_10004".to_string()),
            TransformKind::Passthrough,
        ),
    ]);
    let mapped = mapper.map(&test_record(), &test_schema());

    assert_eq!(
        mapped.get("Jira Issue Key").unwrap().value,
        ResolvedValue::Scalar(json!("LE-7"))
    );
    assert_eq!(
        mapped.get("Story Points").unwrap().value.to_json(),
        json!(5)
    );
    assert!(mapped.failures.is_empty());
}

#[test]
fn test_passthrough_enum_list_takes_first() {
    let mapper = FieldMapper::new(vec![FieldMapping::new(
        "Sprint",
        SourceExtractor::Field("customfield_10007".to_string()),
        TransformKind::Passthrough,
    )]);
    let mapped = mapper.map(&test_record(), &test_schema());
    assert_eq!(mapped.entries[0].value, ResolvedValue::Scalar(json!("Sprint 4")));
}

#[test]
fn test_date_to_epoch_millis() {
    let mapper = FieldMapper::new(vec![FieldMapping::new(
        "Created",
        SourceExtractor::Field("created".to_string()),
        TransformKind::Date,
    )]);
    let mapped = mapper.map(&test_record(), &test_schema());
    assert_eq!(mapped.entries[0].value.to_json(), json!(1_675_245_600_000_i64));
}

#[test]
fn test_unparseable_date_is_null_and_reported() {
    let mut record = test_record();
    record
        .fields
        .insert("created".to_string(), FieldValue::Text("yesterday".to_string()));
    let mapper = FieldMapper::new(vec![FieldMapping::new(
        "Created",
        SourceExtractor::Field("created".to_string()),
        TransformKind::Date,
    )]);
    let mapped = mapper.map(&record, &test_schema());

    assert!(mapped.entries[0].value.is_null());
    assert_eq!(mapped.failures.len(), 1);
    assert_eq!(mapped.failures[0].kind, FailureKind::ContentParse);
}

#[test]
fn test_single_select_resolves_option() {
    let mapper = FieldMapper::new(vec![FieldMapping::new(
        "Priority",
        SourceExtractor::Field("priority".to_string()),
        TransformKind::SingleSelect,
    )]);
    let mapped = mapper.map(&test_record(), &test_schema());
    assert_eq!(mapped.entries[0].value, ResolvedValue::Scalar(json!("p-high")));
}

#[test]
fn test_single_select_unresolved_is_null() {
    let mut record = test_record();
    record
        .fields
        .insert("priority".to_string(), FieldValue::Enum("Blocker".to_string()));
    let mapper = FieldMapper::new(vec![FieldMapping::new(
        "Priority",
        SourceExtractor::Field("priority".to_string()),
        TransformKind::SingleSelect,
    )]);
    let mapped = mapper.map(&record, &test_schema());

    assert_eq!(mapped.entries.len(), 1);
    assert!(mapped.entries[0].value.is_null());
    assert_eq!(mapped.failures[0].kind, FailureKind::SchemaOptionNotFound);
}

#[test]
fn test_multi_select_keeps_only_resolved_in_order() {
    let mapper = FieldMapper::new(vec![FieldMapping::new(
        "Product",
        SourceExtractor::Field("customfield_13300".to_string()),
        TransformKind::MultiSelect,
    )]);
    let mapped = mapper.map(&test_record(), &test_schema());

    // 3 source values, 2 resolvable.
    assert_eq!(
        mapped.entries[0].value,
        ResolvedValue::Options(vec!["pr-a".to_string(), "pr-c".to_string()])
    );
    assert_eq!(mapped.failures.len(), 1);
    assert_eq!(mapped.failures[0].kind, FailureKind::SchemaOptionNotFound);
}

#[test]
fn test_multi_select_all_unresolved_keeps_field() {
    let mut record = test_record();
    record.fields.insert(
        "customfield_13300".to_string(),
        FieldValue::EnumList(vec!["X".to_string(), "Y".to_string()]),
    );
    let mapper = FieldMapper::new(vec![FieldMapping::new(
        "Product",
        SourceExtractor::Field("customfield_13300".to_string()),
        TransformKind::MultiSelect,
    )]);
    let mapped = mapper.map(&record, &test_schema());

    assert_eq!(mapped.entries[0].value, ResolvedValue::Options(vec![]));
    assert_eq!(mapped.failures.len(), 2);
}

#[test]
fn test_links_collects_both_directions() {
    let mut record = test_record();
    record.links = vec![
        LinkRef {
            direction: LinkDirection::Outward,
            id: "200".to_string(),
            key: "LE-20".to_string(),
        },
        LinkRef {
            direction: LinkDirection::Inward,
            id: "300".to_string(),
            key: "LE-30".to_string(),
        },
    ];
    let mapper = FieldMapper::new(vec![FieldMapping::new(
        "Issue Links",
        SourceExtractor::Links,
        TransformKind::Links,
    )]);
    let mapped = mapper.map(&record, &test_schema());

    assert_eq!(
        mapped.entries[0].value,
        ResolvedValue::Scalar(json!("[\"200\",\"300\"]"))
    );
}

#[test]
fn test_links_empty_is_null() {
    let mapper = FieldMapper::new(vec![FieldMapping::new(
        "Issue Links",
        SourceExtractor::Links,
        TransformKind::Links,
    )]);
    let mapped = mapper.map(&test_record(), &test_schema());
    assert!(mapped.entries[0].value.is_null());
}

#[test]
fn test_rich_text_extraction() {
    let mut record = test_record();
    record.fields.insert(
        "customfield_13400".to_string(),
        FieldValue::Document(json!({
            "type": "doc",
            "content": [{"type": "paragraph", "content": [{"type": "text", "text": "Bad deploy"}]}]
        })),
    );
    record.fields.insert(
        "customfield_empty".to_string(),
        FieldValue::Document(json!({"type": "doc", "content": []})),
    );
    let mapper = FieldMapper::new(vec![
        FieldMapping::new(
            "Root Cause",
            SourceExtractor::Field("customfield_13400".to_string()),
            TransformKind::RichText,
        ),
        FieldMapping::new(
            "Sprint",
            SourceExtractor::Field("customfield_empty".to_string()),
            TransformKind::RichText,
        ),
    ]);
    let mapped = mapper.map(&record, &test_schema());

    assert_eq!(mapped.entries[0].value, ResolvedValue::Scalar(json!("Bad deploy")));
    assert!(mapped.entries[1].value.is_null());
    assert!(mapped.failures.is_empty());
}

#[test]
fn test_default_used_when_missing() {
    let mapper = FieldMapper::new(vec![FieldMapping::new(
        "Resolution (New)",
        SourceExtractor::Field("resolution".to_string()),
        TransformKind::Passthrough,
    )
    .with_default("Unresolved")]);
    let mapped = mapper.map(&test_record(), &test_schema());
    assert_eq!(mapped.entries[0].value, ResolvedValue::Scalar(json!("Unresolved")));
}

#[test]
fn test_missing_value_without_default_is_null() {
    let mapper = FieldMapper::new(vec![FieldMapping::new(
        "Resolution (New)",
        SourceExtractor::Field("resolution".to_string()),
        TransformKind::Passthrough,
    )]);
    let mapped = mapper.map(&test_record(), &test_schema());
    assert!(mapped.entries[0].value.is_null());
    assert!(mapped.failures.is_empty());
}

#[test]
fn test_empty_source_is_always_null() {
    let schema = DestinationSchema::from_fields(vec![field("f-qa", "QA Assignee", vec![])]);
    let mapper = FieldMapper::new(vec![FieldMapping::new(
        "QA Assignee",
        SourceExtractor::Empty,
        TransformKind::Passthrough,
    )]);

    let mapped = mapper.map(&test_record(), &schema);

    assert_eq!(mapped.entries.len(), 1);
    assert_eq!(mapped.entries[0].field_id, "f-qa");
    assert!(mapped.entries[0].value.is_null());
    assert!(mapped.failures.is_empty());
}

#[test]
fn test_unknown_destination_field_does_not_abort_others() {
    let mapper = FieldMapper::new(vec![
        FieldMapping::new("QA Assignee", SourceExtractor::Key, TransformKind::Passthrough),
        FieldMapping::new("Jira Issue Key", SourceExtractor::Key, TransformKind::Passthrough),
    ]);
    let mapped = mapper.map(&test_record(), &test_schema());

    assert_eq!(mapped.entries.len(), 1);
    assert_eq!(mapped.entries[0].field_id, "f-key");
    assert_eq!(mapped.failures.len(), 1);
    assert_eq!(mapped.failures[0].kind, FailureKind::SchemaFieldNotFound);
}

#[test]
fn test_mapping_is_deterministic() {
    let mapper = FieldMapper::new(vec![
        FieldMapping::new("Jira Issue Key", SourceExtractor::Key, TransformKind::Passthrough),
        FieldMapping::new(
            "Product",
            SourceExtractor::Field("customfield_13300".to_string()),
            TransformKind::MultiSelect,
        ),
    ]);
    let schema = test_schema();
    let first = mapper.map(&test_record(), &schema);
    let second = mapper.map(&test_record(), &schema);
    assert_eq!(first.entries, second.entries);
}

#[test]
fn test_parse_timestamp_formats() {
    assert!(parse_timestamp("2024-03-01T10:15:00Z").is_some());
    assert!(parse_timestamp("2024-03-01T10:15:00.000+0000").is_some());
    assert_eq!(
        parse_timestamp("2024-03-01").unwrap().timestamp_millis(),
        1_709_251_200_000
    );
    assert!(parse_timestamp("03/01/2024").is_none());
}
