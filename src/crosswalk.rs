//! External id crosswalk.
//!
//! Each crosswalk row pairs one canonical restaurant id with up to
//! [`MAX_EXTERNAL_IDS`] Yelp business ids. The resolver inverts that into an
//! `external -> canonical` lookup and rewrites the restaurant id of record sets,
//! dropping rows it cannot resolve.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::models::{CanonicalId, ExternalId, FieldValue, Record, RecordSet};

/// Maximum number of external ids one crosswalk row may carry
pub const MAX_EXTERNAL_IDS: usize = 4;

/// Canonical column holding the restaurant id on every normalized record
pub const RESTAURANT_ID: &str = "restaurant_id";

/// Column that keeps the external id a row was resolved from
pub const SOURCE_BUSINESS_ID: &str = "source_business_id";

/// One crosswalk row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrosswalkEntry {
    canonical: CanonicalId,
    external_ids: Vec<ExternalId>,
}

impl CrosswalkEntry {
    /// Build an entry from the non-null external ids of a row
    pub fn new(canonical: CanonicalId, external_ids: Vec<ExternalId>) -> Result<Self> {
        if external_ids.len() > MAX_EXTERNAL_IDS {
            return Err(PipelineError::CrosswalkEntryTooWide {
                canonical: canonical.0,
                count: external_ids.len(),
                max: MAX_EXTERNAL_IDS,
            });
        }
        Ok(Self {
            canonical,
            external_ids,
        })
    }

    /// Canonical id of this row
    #[must_use]
    pub const fn canonical(&self) -> &CanonicalId {
        &self.canonical
    }

    /// External ids of this row, in column order
    #[must_use]
    pub fn external_ids(&self) -> &[ExternalId] {
        &self.external_ids
    }
}

/// Outcome of looking up an external id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The id maps to this canonical id
    Known(CanonicalId),
    /// The id is not in the crosswalk
    Unknown,
}

/// An external id listed under more than one canonical id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// The contested external id
    pub external: ExternalId,
    /// Canonical id that was overwritten
    pub previous: CanonicalId,
    /// Canonical id that won (the later row)
    pub winner: CanonicalId,
}

/// `external id -> canonical id` lookup built from crosswalk rows
#[derive(Debug, Clone, Default)]
pub struct CrosswalkResolver {
    mapping: HashMap<ExternalId, CanonicalId>,
    canonical_ids: HashSet<CanonicalId>,
    collisions: Vec<Collision>,
}

impl CrosswalkResolver {
    /// Build the lookup. Collisions are last-write-wins and are recorded.
    pub fn from_entries(entries: &[CrosswalkEntry]) -> Result<Self> {
        if entries.is_empty() {
            return Err(PipelineError::EmptyCrosswalk);
        }

        let mut resolver = Self::default();
        for entry in entries {
            resolver.canonical_ids.insert(entry.canonical.clone());
            for external in &entry.external_ids {
                if let Some(previous) = resolver
                    .mapping
                    .insert(external.clone(), entry.canonical.clone())
                {
                    if previous != entry.canonical {
                        warn!(
                            external = %external,
                            previous = %previous,
                            winner = %entry.canonical,
                            "External id listed under two restaurants; keeping the later row"
                        );
                        resolver.collisions.push(Collision {
                            external: external.clone(),
                            previous,
                            winner: entry.canonical.clone(),
                        });
                    }
                }
            }
        }

        if resolver.mapping.is_empty() {
            return Err(PipelineError::EmptyCrosswalk);
        }

        info!(
            rows = entries.len(),
            external_ids = resolver.mapping.len(),
            collisions = resolver.collisions.len(),
            "Crosswalk loaded"
        );
        Ok(resolver)
    }

    /// Resolve an external id
    #[must_use]
    pub fn resolve(&self, external: &ExternalId) -> Resolution {
        self.mapping
            .get(external)
            .map_or(Resolution::Unknown, |c| Resolution::Known(c.clone()))
    }

    /// Resolve an external id given as a string
    #[must_use]
    pub fn resolve_str(&self, external: &str) -> Resolution {
        self.resolve(&ExternalId::new(external))
    }

    /// True if the canonical id appears in any crosswalk row
    #[must_use]
    pub fn knows_canonical(&self, canonical: &CanonicalId) -> bool {
        self.canonical_ids.contains(canonical)
    }

    /// Number of external ids in the lookup
    #[must_use]
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// True if the lookup is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// External ids that were claimed by more than one canonical id
    #[must_use]
    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }

    /// Rewrite `restaurant_id` of every record from external to canonical.
    ///
    /// The external id is kept under `source_business_id`. Records whose id is
    /// missing or unknown are dropped; the count of dropped rows is returned
    /// alongside the new set.
    #[must_use]
    pub fn resolve_records(&self, set: &RecordSet) -> (RecordSet, usize) {
        let mut resolved = Vec::with_capacity(set.len());
        let mut dropped = 0;

        for record in &set.records {
            match resolve_record(self, record) {
                Some(record) => resolved.push(record),
                None => dropped += 1,
            }
        }

        debug!(
            source = %set.kind,
            kept = resolved.len(),
            dropped,
            "Resolved restaurant ids"
        );
        (RecordSet::new(set.kind, resolved), dropped)
    }
}

fn resolve_record(resolver: &CrosswalkResolver, record: &Record) -> Option<Record> {
    let external = record.text(RESTAURANT_ID)?;
    match resolver.resolve_str(external) {
        Resolution::Known(canonical) => Some(
            record
                .clone()
                .with(SOURCE_BUSINESS_ID, FieldValue::Text(external.to_string()))
                .with(RESTAURANT_ID, FieldValue::Text(canonical.0)),
        ),
        Resolution::Unknown => None,
    }
}
