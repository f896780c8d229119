//! Data models for the inspection feature pipeline
//!
//! This module contains the structures shared by every stage: identifiers,
//! the generic normalized `Record`, label rows and the flattened documents
//! handed to the model.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A raw record as read from a source, before normalization
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Internal stable identifier of a restaurant (the inspection data's id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalId(pub String);

/// Identifier of a business in an external source (a Yelp business id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExternalId(pub String);

impl CanonicalId {
    /// Create a canonical id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ExternalId {
    /// Create an external id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A typed value held by a normalized record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Explicit marker for a field the source did not provide
    Missing,
    /// Free text or identifier
    Text(String),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// Parsed date/time value
    Timestamp(NaiveDateTime),
    /// List of strings (categories, friends, ...)
    List(Vec<String>),
    /// Nested structure kept opaque (hours, attributes, check-in info)
    Json(serde_json::Value),
}

impl FieldValue {
    /// True if this is the missing marker
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Text content, if this is a text value
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Timestamp content, if this is a timestamp value
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Numeric content as `f64`, if this is an integer or float value
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Render the value as a flat string for export; missing renders empty
    #[must_use]
    pub fn to_export_string(&self) -> String {
        match self {
            Self::Missing => String::new(),
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            Self::List(items) => items.join("|"),
            Self::Json(value) => value.to_string(),
        }
    }
}

/// A normalized record: canonical field names mapped to typed values.
///
/// Records are never mutated once a stage hands them on; joins build new
/// records through [`Record::merged`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Create an empty record
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Set a field
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    /// Look up a field; absent and missing both return `None`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).filter(|v| !v.is_missing())
    }

    /// True if the record carries the field at all (missing marker included)
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Text value of a field
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    /// Timestamp value of a field
    #[must_use]
    pub fn timestamp(&self, name: &str) -> Option<NaiveDateTime> {
        self.get(name).and_then(FieldValue::as_timestamp)
    }

    /// Column names in sorted order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Iterate over all fields in column order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of columns
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the record has no columns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// New record holding this record's fields overlaid with `other`'s
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut fields = self.fields.clone();
        for (name, value) in &other.fields {
            fields.insert(name.clone(), value.clone());
        }
        Self { fields }
    }
}

/// The kind of dataset a record set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Yelp reviews
    Review,
    /// Yelp tips
    Tip,
    /// Reviews and tips stacked into one event set
    Event,
    /// Yelp users
    User,
    /// Yelp businesses
    Business,
    /// Yelp check-ins
    Checkin,
    /// Inspection labels with targets
    TrainingLabels,
    /// Inspection rows to be scored
    SubmissionLabels,
}

impl SourceKind {
    /// Short name used in logs and metrics
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Review => "review",
            Self::Tip => "tip",
            Self::Event => "event",
            Self::User => "user",
            Self::Business => "business",
            Self::Checkin => "checkin",
            Self::TrainingLabels => "train_labels",
            Self::SubmissionLabels => "submission",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An ordered set of normalized records from one source
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    /// Source the records came from
    pub kind: SourceKind,
    /// Records in source order
    pub records: Vec<Record>,
}

impl RecordSet {
    /// Create a record set
    #[must_use]
    pub const fn new(kind: SourceKind, records: Vec<Record>) -> Self {
        Self { kind, records }
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if there are no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Identifier of a label row (the inspection id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelId(pub String);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Violation counts for one inspection, by severity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    /// Minor violations (`*`)
    pub one_star: f64,
    /// Significant violations (`**`)
    pub two_star: f64,
    /// Severe violations (`***`)
    pub three_star: f64,
}

/// One inspection: the unit a prediction is made for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRecord {
    /// Inspection id, used as the row identifier
    pub id: LabelId,
    /// Restaurant the inspection belongs to
    pub restaurant_id: CanonicalId,
    /// When the inspection took place
    pub inspection_date: NaiveDateTime,
    /// Outcome targets (training only)
    pub targets: Option<Targets>,
}

/// Dataset role of a label table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Training labels with targets
    Train,
    /// Submission rows to be scored
    Test,
}

impl Role {
    /// Name used as cache key and in logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Flattened text per label row, in label-table order.
///
/// Every label row has an entry; a label with no qualifying events maps to
/// the empty string. Lookups by label id go through a position index; if an
/// id repeats, its first entry wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(LabelId, String)>", into = "Vec<(LabelId, String)>")]
pub struct FlattenedDocuments {
    entries: Vec<(LabelId, String)>,
    positions: HashMap<LabelId, usize>,
}

impl From<Vec<(LabelId, String)>> for FlattenedDocuments {
    fn from(entries: Vec<(LabelId, String)>) -> Self {
        Self::from_ordered(entries)
    }
}

impl From<FlattenedDocuments> for Vec<(LabelId, String)> {
    fn from(documents: FlattenedDocuments) -> Self {
        documents.entries
    }
}

impl FlattenedDocuments {
    /// Build from entries already in label order
    #[must_use]
    pub fn from_ordered(entries: Vec<(LabelId, String)>) -> Self {
        let mut positions = HashMap::with_capacity(entries.len());
        for (i, (id, _)) in entries.iter().enumerate() {
            positions.entry(id.clone()).or_insert(i);
        }
        Self { entries, positions }
    }

    /// Number of documents
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no documents
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Document for a label id
    #[must_use]
    pub fn get(&self, id: &LabelId) -> Option<&str> {
        self.positions
            .get(id)
            .and_then(|&i| self.entries.get(i))
            .map(|(_, text)| text.as_str())
    }

    /// Iterate over `(label id, document)` pairs in label order
    pub fn iter(&self) -> impl Iterator<Item = (&LabelId, &str)> {
        self.entries.iter().map(|(id, text)| (id, text.as_str()))
    }

    /// Label ids in order
    pub fn ids(&self) -> impl Iterator<Item = &LabelId> {
        self.entries.iter().map(|(id, _)| id)
    }

    /// Number of empty documents
    #[must_use]
    pub fn empty_count(&self) -> usize {
        self.entries.iter().filter(|(_, text)| text.is_empty()).count()
    }
}

/// Model-ready output for one role: documents plus aligned targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    /// Role these features were built for
    pub role: Role,
    /// Flattened documents in label order
    pub documents: FlattenedDocuments,
    /// Targets aligned with `documents` (training only)
    pub targets: Option<Vec<Targets>>,
}

/// Output format for exported tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Comma-separated values format
    Csv,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Get the file extension for this format
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    /// Parse a format name, case-insensitively
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}
