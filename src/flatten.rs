//! Text flattening.
//!
//! For every label row, in label-table order, concatenates the text of all
//! events of that restaurant dated strictly before the inspection. Events are
//! grouped by restaurant once up front, so each label only scans its own
//! restaurant's events.
//!
//! Within a document, texts keep the order of the stacked event set (reviews
//! in file order, then tips in file order). They are not re-sorted by date.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDateTime;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::crosswalk::RESTAURANT_ID;
use crate::join::{EVENT_DATE, EVENT_TEXT};
use crate::models::{CanonicalId, FlattenedDocuments, LabelRecord, RecordSet};
use crate::temporal::precedes;

/// Separator placed between event texts
pub const SEPARATOR: &str = " ";

#[derive(Debug, Clone, PartialEq, Eq)]
struct IndexedEvent {
    date: Option<NaiveDateTime>,
    text: String,
}

/// Events grouped by canonical restaurant id, source order kept per group
#[derive(Debug, Clone, Default)]
pub struct EventIndex {
    by_restaurant: HashMap<CanonicalId, Vec<IndexedEvent>>,
    events: usize,
}

impl EventIndex {
    /// Group resolved events by restaurant. Events without text are skipped.
    #[must_use]
    pub fn from_events(events: &RecordSet) -> Self {
        let mut index = Self::default();
        for record in &events.records {
            let (Some(restaurant), Some(text)) =
                (record.text(RESTAURANT_ID), record.text(EVENT_TEXT))
            else {
                continue;
            };
            index
                .by_restaurant
                .entry(CanonicalId::new(restaurant))
                .or_default()
                .push(IndexedEvent {
                    date: record.timestamp(EVENT_DATE),
                    text: text.to_string(),
                });
            index.events += 1;
        }
        debug!(
            events = index.events,
            restaurants = index.by_restaurant.len(),
            "Indexed events by restaurant"
        );
        index
    }

    /// Number of indexed events
    #[must_use]
    pub const fn len(&self) -> usize {
        self.events
    }

    /// True if no events were indexed
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.events == 0
    }

    /// Number of distinct restaurants with events
    #[must_use]
    pub fn restaurants(&self) -> usize {
        self.by_restaurant.len()
    }

    /// True if any event is indexed for the restaurant
    #[must_use]
    pub fn has_events_for(&self, restaurant: &CanonicalId) -> bool {
        self.by_restaurant.contains_key(restaurant)
    }

    /// Flattened document for a single label
    #[must_use]
    pub fn document_for(&self, label: &LabelRecord) -> String {
        self.by_restaurant
            .get(&label.restaurant_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| precedes(e.date, label.inspection_date))
                    .map(|e| e.text.as_str())
                    .collect::<Vec<_>>()
                    .join(SEPARATOR)
            })
            .unwrap_or_default()
    }
}

/// Options for [`TextFlattener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenOptions {
    /// Log progress every this many labels (0 disables)
    pub progress_interval: usize,
    /// Build documents on the rayon thread pool
    pub parallel: bool,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            progress_interval: 2500,
            parallel: false,
        }
    }
}

/// Builds one document per label row
#[derive(Debug, Clone, Copy)]
pub struct TextFlattener<'a> {
    index: &'a EventIndex,
    options: FlattenOptions,
}

impl<'a> TextFlattener<'a> {
    /// Create a flattener over an event index
    #[must_use]
    pub const fn new(index: &'a EventIndex, options: FlattenOptions) -> Self {
        Self { index, options }
    }

    /// Documents for every label, in label order. Labels without qualifying
    /// events get an empty document.
    #[must_use]
    pub fn flatten(&self, labels: &[LabelRecord]) -> FlattenedDocuments {
        let total = labels.len();
        let done = AtomicUsize::new(0);

        let build = |label: &LabelRecord| {
            let position = done.fetch_add(1, Ordering::Relaxed);
            if self.options.progress_interval > 0 && position % self.options.progress_interval == 0
            {
                info!("{} out of {}", position, total);
            }
            (label.id.clone(), self.index.document_for(label))
        };

        // Indexed parallel collect keeps input order.
        let entries: Vec<_> = if self.options.parallel {
            labels.par_iter().map(build).collect()
        } else {
            labels.iter().map(build).collect()
        };

        let documents = FlattenedDocuments::from_ordered(entries);
        info!(
            labels = total,
            empty = documents.empty_count(),
            "Flattened event text per label"
        );
        documents
    }
}
