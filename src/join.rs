//! Entity joins.
//!
//! Builds the denormalized table: (reviews + tips) joined to users, then to
//! businesses, then left-joined to check-ins, then paired with every label row
//! of the same restaurant. All joins are hash joins that keep the left side's
//! order, so output rows come out in event order, then right-side order.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::info;

use crate::crosswalk::{CrosswalkResolver, RESTAURANT_ID, SOURCE_BUSINESS_ID};
use crate::error::{PipelineError, Result};
use crate::models::{FieldValue, LabelRecord, Record, RecordSet, SourceKind};
use crate::normalize::EVENT_COLUMNS;

/// Column holding the user id on events and users
pub const USER_ID: &str = "user_id";
/// Column holding the event date
pub const EVENT_DATE: &str = "review_date";
/// Column holding the event text
pub const EVENT_TEXT: &str = "text";

const CHECKIN_COLUMNS: &[&str] = &["checkin_info", "checkin_type"];
const BUSINESS_KEY: &[&str] = &[RESTAURANT_ID, SOURCE_BUSINESS_ID];

/// Every normalized source, before crosswalk resolution
#[derive(Debug, Clone)]
pub struct NormalizedSources {
    /// Reviews
    pub reviews: RecordSet,
    /// Tips
    pub tips: RecordSet,
    /// Users
    pub users: RecordSet,
    /// Businesses
    pub businesses: RecordSet,
    /// Check-ins
    pub checkins: RecordSet,
}

/// Stack reviews and tips into one event set: reviews first, then tips,
/// each in source order.
#[must_use]
pub fn stack_events(reviews: &RecordSet, tips: &RecordSet) -> RecordSet {
    let records = reviews
        .records
        .iter()
        .chain(&tips.records)
        .map(|record| {
            let mut record = record.clone();
            for column in EVENT_COLUMNS {
                if !record.has_column(column) {
                    record.insert(*column, FieldValue::Missing);
                }
            }
            record
        })
        .collect();
    RecordSet::new(SourceKind::Event, records)
}

/// One (event, label) pair with all context columns
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    /// Merged event, user, business, check-in and label columns
    pub record: Record,
    /// Position of the event in the stacked event set
    pub event_row: usize,
    /// Position of the label in the label table
    pub label_row: usize,
    /// When the event happened, if known
    pub event_date: Option<NaiveDateTime>,
    /// When the inspection happened
    pub inspection_date: NaiveDateTime,
}

/// Row counts through the join chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Stacked reviews and tips
    pub events: usize,
    /// Events dropped because their business is not in the crosswalk
    pub unresolved: usize,
    /// Rows after joining users
    pub with_users: usize,
    /// Rows after joining businesses
    pub with_businesses: usize,
    /// Rows after the check-in outer join
    pub with_checkins: usize,
    /// (event, label) pairs
    pub pairs: usize,
}

/// The denormalized (event, label) table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinedTable {
    /// Rows in event order, then label order
    pub rows: Vec<JoinedRow>,
    /// Counts recorded while joining
    pub stats: JoinStats,
}

impl JoinedTable {
    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if there are no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Joins normalized sources through a crosswalk
#[derive(Debug, Clone, Copy)]
pub struct EntityJoiner<'a> {
    resolver: &'a CrosswalkResolver,
}

impl<'a> EntityJoiner<'a> {
    /// Create a joiner using the given crosswalk
    #[must_use]
    pub const fn new(resolver: &'a CrosswalkResolver) -> Self {
        Self { resolver }
    }

    /// Resolve and stack reviews and tips, dropping unresolvable rows
    #[must_use]
    pub fn resolved_events(&self, sources: &NormalizedSources) -> (RecordSet, usize) {
        let stacked = stack_events(&sources.reviews, &sources.tips);
        self.resolver.resolve_records(&stacked)
    }

    /// Run the full join chain.
    ///
    /// Rows with an unresolvable business id are removed before any join.
    /// A stage that turns a non-empty input into nothing fails with
    /// [`PipelineError::EmptyJoin`].
    pub fn join(&self, sources: &NormalizedSources, labels: &[LabelRecord]) -> Result<JoinedTable> {
        let mut stats = JoinStats {
            events: sources.reviews.len() + sources.tips.len(),
            ..JoinStats::default()
        };

        let (events, unresolved) = self.resolved_events(sources);
        stats.unresolved = unresolved;
        ensure_rows("crosswalk", stats.events, events.len())?;

        let (businesses, _) = self.resolver.resolve_records(&sources.businesses);
        let (checkins, _) = self.resolver.resolve_records(&sources.checkins);

        let rows: Vec<(usize, Record)> = events.records.into_iter().enumerate().collect();
        let input = rows.len();

        let rows = hash_join(rows, &sources.users.records, &[USER_ID], None);
        stats.with_users = rows.len();
        ensure_rows("users", input, rows.len())?;

        let rows = hash_join(rows, &businesses.records, BUSINESS_KEY, None);
        stats.with_businesses = rows.len();
        ensure_rows("businesses", stats.with_users, rows.len())?;

        let no_checkin = CHECKIN_COLUMNS
            .iter()
            .fold(Record::new(), |r, c| r.with(*c, FieldValue::Missing));
        let rows = hash_join(rows, &checkins.records, BUSINESS_KEY, Some(&no_checkin));
        stats.with_checkins = rows.len();

        let pairs = pair_with_labels(rows, labels);
        stats.pairs = pairs.len();
        ensure_rows("labels", stats.with_checkins, pairs.len())?;

        info!(
            events = stats.events,
            unresolved = stats.unresolved,
            with_users = stats.with_users,
            with_businesses = stats.with_businesses,
            with_checkins = stats.with_checkins,
            pairs = stats.pairs,
            "Joined sources"
        );
        Ok(JoinedTable { rows: pairs, stats })
    }
}

pub(crate) fn ensure_rows(stage: &'static str, input_rows: usize, output_rows: usize) -> Result<()> {
    if input_rows > 0 && output_rows == 0 {
        return Err(PipelineError::EmptyJoin { stage, input_rows });
    }
    Ok(())
}

fn join_key<'r>(record: &'r Record, columns: &[&str]) -> Option<Vec<&'r str>> {
    columns.iter().map(|c| record.text(c)).collect()
}

/// Inner join on `columns`, or left outer join when `fill` is given (unmatched
/// left rows are merged with `fill`).
fn hash_join(
    left: Vec<(usize, Record)>,
    right: &[Record],
    columns: &[&str],
    fill: Option<&Record>,
) -> Vec<(usize, Record)> {
    let mut index: HashMap<Vec<&str>, Vec<&Record>> = HashMap::new();
    for record in right {
        if let Some(key) = join_key(record, columns) {
            index.entry(key).or_default().push(record);
        }
    }

    let mut out = Vec::with_capacity(left.len());
    for (row, record) in left {
        let matches = join_key(&record, columns).and_then(|key| index.get(&key));
        match (matches, fill) {
            (Some(matches), _) => {
                out.extend(matches.iter().map(|m| (row, record.merged(m))));
            }
            (None, Some(fill)) => out.push((row, record.merged(fill))),
            (None, None) => {}
        }
    }
    out
}

fn label_columns(label: &LabelRecord) -> Record {
    let mut record = Record::new()
        .with("inspection_id", FieldValue::Text(label.id.0.clone()))
        .with("inspection_date", FieldValue::Timestamp(label.inspection_date));
    if let Some(targets) = label.targets {
        record.insert("one_star", FieldValue::Float(targets.one_star));
        record.insert("two_star", FieldValue::Float(targets.two_star));
        record.insert("three_star", FieldValue::Float(targets.three_star));
    }
    record
}

/// Pair every event with every label of the same restaurant; no dedup here
fn pair_with_labels(rows: Vec<(usize, Record)>, labels: &[LabelRecord]) -> Vec<JoinedRow> {
    let mut by_restaurant: HashMap<&str, Vec<(usize, &LabelRecord)>> = HashMap::new();
    for (label_row, label) in labels.iter().enumerate() {
        by_restaurant
            .entry(label.restaurant_id.as_str())
            .or_default()
            .push((label_row, label));
    }

    let mut pairs = Vec::new();
    for (event_row, record) in rows {
        let Some(matches) = record.text(RESTAURANT_ID).and_then(|id| by_restaurant.get(id)) else {
            continue;
        };
        let event_date = record.timestamp(EVENT_DATE);
        for (label_row, label) in matches {
            pairs.push(JoinedRow {
                record: record.merged(&label_columns(label)),
                event_row,
                label_row: *label_row,
                event_date,
                inspection_date: label.inspection_date,
            });
        }
    }
    pairs
}
