//! Record normalization.
//!
//! Every source has an explicit mapping from its own field names to the
//! canonical vocabulary. The mapping is checked against the fields a source
//! actually carries before anything is converted, so a renamed or missing
//! column fails the run instead of silently shifting data into the wrong field.
//!
//! Normalization is total: each raw record becomes exactly one record, and
//! every mapped column is present on the output, holding
//! [`FieldValue::Missing`] when the source had nothing usable.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::models::{
    CanonicalId, FieldValue, LabelId, LabelRecord, RawRecord, Record, RecordSet, SourceKind,
    Targets,
};

/// How a source field is converted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text or identifier
    Text,
    /// Whole number
    Integer,
    /// Floating point number
    Float,
    /// True/false flag
    Boolean,
    /// Date or date-time
    Date,
    /// Date that also yields `<prefix>_year`, `<prefix>_month`, `<prefix>_day`
    DateWithParts(&'static str),
    /// Array of strings
    List,
    /// Nested value kept as-is
    Json,
    /// Nested counter object split into `<canonical>_<name>` integer columns
    Counters(&'static [&'static str]),
}

/// Mapping of one source field onto the canonical vocabulary
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Field name in the source
    pub source: &'static str,
    /// Canonical column name (or prefix, for counters)
    pub canonical: &'static str,
    /// Conversion to apply
    pub kind: FieldKind,
    /// Whether the source schema must carry this field
    pub required: bool,
}

const fn field(source: &'static str, canonical: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        source,
        canonical,
        kind,
        required: false,
    }
}

const fn required(source: &'static str, canonical: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        source,
        canonical,
        kind,
        required: true,
    }
}

const VOTES: &[&str] = &["cool", "funny", "useful"];

/// Columns shared by reviews and tips so the two can be stacked
pub const EVENT_COLUMNS: &[&str] = &[
    "restaurant_id",
    "review_id",
    "review_date",
    "review_year",
    "review_month",
    "review_day",
    "review_stars",
    "text",
    "event_type",
    "user_id",
    "tip_likes",
    "vote_cool",
    "vote_funny",
    "vote_useful",
];

/// Field mapping for one source
#[derive(Debug, Clone, Copy)]
pub struct SourceSchema {
    /// Source this mapping applies to
    pub kind: SourceKind,
    /// Field mappings
    pub fields: &'static [FieldSpec],
    /// Extra columns every output record must carry
    pub shared_columns: &'static [&'static str],
}

/// Yelp review mapping
pub const REVIEW_SCHEMA: SourceSchema = SourceSchema {
    kind: SourceKind::Review,
    fields: &[
        required("business_id", "restaurant_id", FieldKind::Text),
        required("date", "review_date", FieldKind::DateWithParts("review")),
        field("review_id", "review_id", FieldKind::Text),
        field("stars", "review_stars", FieldKind::Integer),
        required("text", "text", FieldKind::Text),
        field("type", "event_type", FieldKind::Text),
        required("user_id", "user_id", FieldKind::Text),
        field("votes", "vote", FieldKind::Counters(VOTES)),
    ],
    shared_columns: EVENT_COLUMNS,
};

/// Yelp tip mapping
pub const TIP_SCHEMA: SourceSchema = SourceSchema {
    kind: SourceKind::Tip,
    fields: &[
        required("business_id", "restaurant_id", FieldKind::Text),
        required("date", "review_date", FieldKind::DateWithParts("review")),
        field("likes", "tip_likes", FieldKind::Integer),
        required("text", "text", FieldKind::Text),
        field("type", "event_type", FieldKind::Text),
        required("user_id", "user_id", FieldKind::Text),
    ],
    shared_columns: EVENT_COLUMNS,
};

/// Yelp user mapping
pub const USER_SCHEMA: SourceSchema = SourceSchema {
    kind: SourceKind::User,
    fields: &[
        field("average_stars", "user_average_stars", FieldKind::Float),
        field("compliments", "user_compliments", FieldKind::Json),
        field("elite", "user_elite", FieldKind::List),
        field("fans", "user_fans", FieldKind::Integer),
        field("friends", "user_friends", FieldKind::List),
        field("name", "user_name", FieldKind::Text),
        field("review_count", "user_review_count", FieldKind::Integer),
        field("type", "user_type", FieldKind::Text),
        required("user_id", "user_id", FieldKind::Text),
        field("votes", "user_vote", FieldKind::Counters(VOTES)),
        field("yelping_since", "user_yelping_since", FieldKind::Date),
    ],
    shared_columns: &[],
};

/// Yelp business mapping
pub const BUSINESS_SCHEMA: SourceSchema = SourceSchema {
    kind: SourceKind::Business,
    fields: &[
        field("attributes", "restaurant_attributes", FieldKind::Json),
        required("business_id", "restaurant_id", FieldKind::Text),
        field("categories", "restaurant_categories", FieldKind::List),
        field("city", "restaurant_city", FieldKind::Text),
        field("full_address", "restaurant_full_address", FieldKind::Text),
        field("hours", "restaurant_hours", FieldKind::Json),
        field("latitude", "restaurant_latitude", FieldKind::Float),
        field("longitude", "restaurant_longitude", FieldKind::Float),
        field("name", "restaurant_name", FieldKind::Text),
        field("neighborhoods", "restaurant_neighborhoods", FieldKind::List),
        field("open", "restaurant_open", FieldKind::Boolean),
        field("review_count", "restaurant_review_count", FieldKind::Integer),
        field("stars", "restaurant_stars", FieldKind::Float),
        field("state", "restaurant_state", FieldKind::Text),
        field("type", "restaurant_type", FieldKind::Text),
    ],
    shared_columns: &[],
};

/// Yelp check-in mapping
pub const CHECKIN_SCHEMA: SourceSchema = SourceSchema {
    kind: SourceKind::Checkin,
    fields: &[
        required("business_id", "restaurant_id", FieldKind::Text),
        field("checkin_info", "checkin_info", FieldKind::Json),
        field("type", "checkin_type", FieldKind::Text),
    ],
    shared_columns: &[],
};

/// Training label mapping
pub const TRAINING_LABEL_SCHEMA: SourceSchema = SourceSchema {
    kind: SourceKind::TrainingLabels,
    fields: &[
        required("id", "inspection_id", FieldKind::Text),
        required("date", "inspection_date", FieldKind::Date),
        required("restaurant_id", "restaurant_id", FieldKind::Text),
        required("*", "one_star", FieldKind::Float),
        required("**", "two_star", FieldKind::Float),
        required("***", "three_star", FieldKind::Float),
    ],
    shared_columns: &[],
};

/// Submission mapping; targets are not read
pub const SUBMISSION_SCHEMA: SourceSchema = SourceSchema {
    kind: SourceKind::SubmissionLabels,
    fields: &[
        required("id", "inspection_id", FieldKind::Text),
        required("date", "inspection_date", FieldKind::Date),
        required("restaurant_id", "restaurant_id", FieldKind::Text),
    ],
    shared_columns: &[],
};

impl SourceSchema {
    /// Mapping for a source kind; the stacked event set has none of its own
    #[must_use]
    pub const fn for_kind(kind: SourceKind) -> Option<Self> {
        match kind {
            SourceKind::Review => Some(REVIEW_SCHEMA),
            SourceKind::Tip => Some(TIP_SCHEMA),
            SourceKind::Event => None,
            SourceKind::User => Some(USER_SCHEMA),
            SourceKind::Business => Some(BUSINESS_SCHEMA),
            SourceKind::Checkin => Some(CHECKIN_SCHEMA),
            SourceKind::TrainingLabels => Some(TRAINING_LABEL_SCHEMA),
            SourceKind::SubmissionLabels => Some(SUBMISSION_SCHEMA),
        }
    }

    /// Check the mapping against the fields a source actually carries.
    ///
    /// Fails on any required field the source lacks. Source fields the mapping
    /// does not name are ignored and logged.
    pub fn check<'a>(&self, observed: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let observed: BTreeSet<&str> = observed.into_iter().collect();

        let missing: Vec<String> = self
            .fields
            .iter()
            .filter(|spec| spec.required && !observed.contains(spec.source))
            .map(|spec| spec.source.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::SchemaMismatch {
                source_kind: self.kind.name().to_string(),
                missing,
            });
        }

        let unmapped: Vec<&str> = observed
            .iter()
            .filter(|name| !self.fields.iter().any(|spec| spec.source == **name))
            .copied()
            .collect();
        if !unmapped.is_empty() {
            debug!(source = %self.kind, ?unmapped, "Ignoring unmapped source fields");
        }
        Ok(())
    }

    /// Normalize one raw record. Returns the record and how many present values
    /// could not be converted.
    #[must_use]
    pub fn normalize_record(&self, raw: &RawRecord) -> (Record, usize) {
        let mut record = Record::new();
        let mut failures = 0;

        for column in self.shared_columns {
            record.insert(*column, FieldValue::Missing);
        }

        for spec in self.fields {
            let value = raw.get(spec.source).unwrap_or(&Value::Null);
            failures += apply_field(&mut record, spec, value);
        }

        (record, failures)
    }

    /// Normalize a whole source after checking its schema
    pub fn normalize(&self, raw: &[RawRecord]) -> Result<RecordSet> {
        if !raw.is_empty() {
            let observed: BTreeSet<&str> = raw
                .iter()
                .flat_map(|record| record.keys().map(String::as_str))
                .collect();
            self.check(observed)?;
        }

        let mut failures = 0;
        let records: Vec<Record> = raw
            .iter()
            .map(|r| {
                let (record, failed) = self.normalize_record(r);
                failures += failed;
                record
            })
            .collect();

        if failures > 0 {
            warn!(
                source = %self.kind,
                failures,
                "Values that could not be converted were marked missing"
            );
        }
        info!(source = %self.kind, records = records.len(), "Normalized records");
        Ok(RecordSet::new(self.kind, records))
    }
}

/// Write the converted value(s) of one field; returns 1 on conversion failure
fn apply_field(record: &mut Record, spec: &FieldSpec, value: &Value) -> usize {
    match spec.kind {
        FieldKind::Counters(names) => {
            let nested = value.as_object();
            for name in names {
                let sub = nested
                    .and_then(|n| n.get(*name))
                    .and_then(coerce_integer)
                    .map_or(FieldValue::Missing, FieldValue::Integer);
                record.insert(format!("{}_{name}", spec.canonical), sub);
            }
            usize::from(!value.is_null() && nested.is_none())
        }
        FieldKind::DateWithParts(prefix) => {
            let ts = coerce(value, FieldKind::Date);
            let parts = ts.as_ref().and_then(FieldValue::as_timestamp);
            record.insert(
                format!("{prefix}_year"),
                parts.map_or(FieldValue::Missing, |t| FieldValue::Integer(i64::from(t.year()))),
            );
            record.insert(
                format!("{prefix}_month"),
                parts.map_or(FieldValue::Missing, |t| FieldValue::Integer(i64::from(t.month()))),
            );
            record.insert(
                format!("{prefix}_day"),
                parts.map_or(FieldValue::Missing, |t| FieldValue::Integer(i64::from(t.day()))),
            );
            store(record, spec.canonical, ts, value)
        }
        kind => store(record, spec.canonical, coerce(value, kind), value),
    }
}

fn store(record: &mut Record, column: &str, converted: Option<FieldValue>, raw: &Value) -> usize {
    let failed = converted.is_none() && !raw.is_null();
    record.insert(column, converted.unwrap_or(FieldValue::Missing));
    usize::from(failed)
}

fn coerce(value: &Value, kind: FieldKind) -> Option<FieldValue> {
    if value.is_null() {
        return None;
    }
    match kind {
        FieldKind::Text => match value {
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            Value::Number(n) => Some(FieldValue::Text(n.to_string())),
            _ => None,
        },
        FieldKind::Integer => coerce_integer(value).map(FieldValue::Integer),
        FieldKind::Float => coerce_float(value).map(FieldValue::Float),
        FieldKind::Boolean => match value {
            Value::Bool(b) => Some(FieldValue::Boolean(*b)),
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" => Some(FieldValue::Boolean(true)),
                "false" | "0" => Some(FieldValue::Boolean(false)),
                _ => None,
            },
            _ => None,
        },
        FieldKind::Date | FieldKind::DateWithParts(_) => value
            .as_str()
            .and_then(parse_timestamp)
            .map(FieldValue::Timestamp),
        FieldKind::List => match value {
            Value::Array(items) => Some(FieldValue::List(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            )),
            Value::String(s) => Some(FieldValue::List(vec![s.clone()])),
            _ => None,
        },
        FieldKind::Json => Some(FieldValue::Json(value.clone())),
        FieldKind::Counters(_) => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM`.
/// Date-only values are taken at midnight.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Some(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    // yelping_since is month precision
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Convert a normalized label set into typed label rows, keeping row order.
///
/// A label row without id, restaurant or inspection date cannot be scored
/// against anything and fails the run.
pub fn to_label_records(set: &RecordSet) -> Result<Vec<LabelRecord>> {
    let with_targets = set.kind == SourceKind::TrainingLabels;

    set.records
        .iter()
        .enumerate()
        .map(|(row, record)| {
            let invalid = |reason: &str| PipelineError::InvalidLabel {
                row,
                reason: reason.to_string(),
            };

            let id = record
                .text("inspection_id")
                .ok_or_else(|| invalid("missing inspection id"))?;
            let restaurant_id = record
                .text("restaurant_id")
                .ok_or_else(|| invalid("missing restaurant id"))?;
            let inspection_date = record
                .timestamp("inspection_date")
                .ok_or_else(|| invalid("missing or unparseable inspection date"))?;

            let targets = if with_targets {
                let target = |name: &str| {
                    record
                        .get(name)
                        .and_then(FieldValue::as_f64)
                        .ok_or_else(|| invalid(&format!("missing target {name}")))
                };
                Some(Targets {
                    one_star: target("one_star")?,
                    two_star: target("two_star")?,
                    three_star: target("three_star")?,
                })
            } else {
                None
            };

            Ok(LabelRecord {
                id: LabelId(id.to_string()),
                restaurant_id: CanonicalId::new(restaurant_id),
                inspection_date,
                targets,
            })
        })
        .collect()
}
