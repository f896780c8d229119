//! End-to-end feature pipeline.
//!
//! `prepare` normalizes every source and builds the crosswalk once; the joined
//! feature table and the flattened documents for each role are then derived
//! from the prepared data. The artifact cache is touched only in
//! [`FeaturePipeline::run`] and [`FeaturePipeline::load_cached`].

use tracing::{info, warn};

use crate::cache::ArtifactCache;
use crate::config::PipelineConfig;
use crate::crosswalk::CrosswalkResolver;
use crate::error::{PipelineError, Result};
use crate::flatten::{EventIndex, FlattenOptions, TextFlattener};
use crate::join::{ensure_rows, EntityJoiner, JoinedTable, NormalizedSources};
use crate::logging::OperationTimer;
use crate::metrics::MetricsCollector;
use crate::models::{FeatureTable, FlattenedDocuments, LabelRecord, RawRecord, Role};
use crate::normalize::{
    to_label_records, SourceSchema, BUSINESS_SCHEMA, CHECKIN_SCHEMA, REVIEW_SCHEMA,
    SUBMISSION_SCHEMA, TIP_SCHEMA, TRAINING_LABEL_SCHEMA, USER_SCHEMA,
};
use crate::sources::RawDatasets;
use crate::temporal::drop_future_events;

/// What to do with label rows whose restaurant is not in the crosswalk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownLabelPolicy {
    /// Keep the row; its document is empty
    Empty,
    /// Abort the run
    Reject,
}

impl UnknownLabelPolicy {
    /// Parse `"empty"` or `"reject"`
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "empty" => Ok(Self::Empty),
            "reject" => Ok(Self::Reject),
            other => Err(PipelineError::InvalidConfig(format!(
                "unknown label policy: {other}"
            ))),
        }
    }
}

/// Runtime settings of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Aggregator options
    pub flatten: FlattenOptions,
    /// Policy for training labels
    pub unknown_train_labels: UnknownLabelPolicy,
    /// Policy for submission rows
    pub unknown_test_labels: UnknownLabelPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            flatten: FlattenOptions::default(),
            unknown_train_labels: UnknownLabelPolicy::Empty,
            unknown_test_labels: UnknownLabelPolicy::Empty,
        }
    }
}

impl TryFrom<&PipelineConfig> for PipelineSettings {
    type Error = PipelineError;

    fn try_from(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            flatten: FlattenOptions {
                progress_interval: config.progress_interval,
                parallel: config.parallel,
            },
            unknown_train_labels: UnknownLabelPolicy::parse(&config.unknown_train_labels)?,
            unknown_test_labels: UnknownLabelPolicy::parse(&config.unknown_test_labels)?,
        })
    }
}

/// Normalized, crosswalk-indexed inputs shared by every derived output
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// External id lookup
    pub resolver: CrosswalkResolver,
    /// Normalized sources (restaurant ids still external)
    pub sources: NormalizedSources,
    /// Training labels in file order
    pub train_labels: Vec<LabelRecord>,
    /// Submission rows in file order
    pub test_labels: Vec<LabelRecord>,
    /// Resolved events grouped by restaurant
    pub events: EventIndex,
}

impl PreparedData {
    /// Label rows for a role
    #[must_use]
    pub fn labels(&self, role: Role) -> &[LabelRecord] {
        match role {
            Role::Train => &self.train_labels,
            Role::Test => &self.test_labels,
        }
    }
}

/// Documents for both roles
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Training features with targets
    pub train: FeatureTable,
    /// Submission features
    pub test: FeatureTable,
}

/// Orchestrates normalization, joins, the no-future filter and flattening
#[derive(Debug, Clone, Default)]
pub struct FeaturePipeline {
    settings: PipelineSettings,
    metrics: MetricsCollector,
}

impl FeaturePipeline {
    /// Create a pipeline
    #[must_use]
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            settings,
            metrics: MetricsCollector::default(),
        }
    }

    /// Settings in use
    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    fn normalize(&self, schema: &SourceSchema, raw: &[RawRecord]) -> Result<crate::models::RecordSet> {
        let set = schema.normalize(raw)?;
        self.metrics.record_normalized(schema.kind, set.len());
        Ok(set)
    }

    /// Normalize every source and build the crosswalk and event index
    pub fn prepare(&self, raw: &RawDatasets) -> Result<PreparedData> {
        let timer = OperationTimer::new("prepare");

        let resolver = CrosswalkResolver::from_entries(&raw.crosswalk)?;
        self.metrics
            .record_crosswalk(resolver.len(), resolver.collisions().len());

        let sources = NormalizedSources {
            reviews: self.normalize(&REVIEW_SCHEMA, &raw.reviews)?,
            tips: self.normalize(&TIP_SCHEMA, &raw.tips)?,
            users: self.normalize(&USER_SCHEMA, &raw.users)?,
            businesses: self.normalize(&BUSINESS_SCHEMA, &raw.businesses)?,
            checkins: self.normalize(&CHECKIN_SCHEMA, &raw.checkins)?,
        };
        let train_labels =
            to_label_records(&self.normalize(&TRAINING_LABEL_SCHEMA, &raw.train_labels)?)?;
        let test_labels = to_label_records(&self.normalize(&SUBMISSION_SCHEMA, &raw.submission)?)?;

        let stacked = sources.reviews.len() + sources.tips.len();
        let (events, unresolved) = EntityJoiner::new(&resolver).resolved_events(&sources);
        self.metrics.record_unresolved("prepare", unresolved);
        if unresolved > 0 {
            info!(unresolved, "Dropped events for restaurants outside the crosswalk");
        }
        ensure_rows("crosswalk", stacked, events.len())?;
        let events = EventIndex::from_events(&events);

        self.metrics.record_stage("prepare", timer.finish());
        Ok(PreparedData {
            resolver,
            sources,
            train_labels,
            test_labels,
            events,
        })
    }

    /// Joined (event, training label) table with every event at or after its
    /// inspection removed
    pub fn full_features(&self, data: &PreparedData) -> Result<JoinedTable> {
        let timer = OperationTimer::new("join");
        let joined = EntityJoiner::new(&data.resolver).join(&data.sources, &data.train_labels)?;
        self.metrics.record_join(&joined.stats);

        let before = joined.len();
        let filtered = drop_future_events(joined);
        self.metrics.record_future_removed(before - filtered.len());

        self.metrics.record_stage("join", timer.finish());
        Ok(filtered)
    }

    fn check_unknown_labels(&self, data: &PreparedData, role: Role) -> Result<()> {
        let policy = match role {
            Role::Train => self.settings.unknown_train_labels,
            Role::Test => self.settings.unknown_test_labels,
        };

        let unknown: Vec<&LabelRecord> = data
            .labels(role)
            .iter()
            .filter(|label| !data.resolver.knows_canonical(&label.restaurant_id))
            .collect();
        let Some(first) = unknown.first() else {
            return Ok(());
        };

        match policy {
            UnknownLabelPolicy::Empty => {
                warn!(
                    role = %role,
                    count = unknown.len(),
                    first = %first.restaurant_id,
                    "Label rows reference restaurants outside the crosswalk; their documents will be empty"
                );
                Ok(())
            }
            UnknownLabelPolicy::Reject => Err(PipelineError::UnresolvedLabels {
                role: role.name().to_string(),
                count: unknown.len(),
                first: first.restaurant_id.0.clone(),
            }),
        }
    }

    /// Fails when there are labels and events but no label's restaurant has
    /// any event
    fn check_label_overlap(data: &PreparedData, role: Role) -> Result<()> {
        let labels = data.labels(role);
        if labels.is_empty() || data.events.is_empty() {
            return Ok(());
        }
        let matched = labels
            .iter()
            .filter(|label| data.events.has_events_for(&label.restaurant_id))
            .count();
        ensure_rows("labels", labels.len(), matched)
    }

    /// Flattened documents for one role, with aligned targets for training
    pub fn documents(&self, data: &PreparedData, role: Role) -> Result<FeatureTable> {
        self.check_unknown_labels(data, role)?;
        Self::check_label_overlap(data, role)?;

        let timer = OperationTimer::new("flatten");
        let labels = data.labels(role);
        let documents = TextFlattener::new(&data.events, self.settings.flatten).flatten(labels);
        self.metrics.record_documents(role, &documents);
        self.metrics.record_stage("flatten", timer.finish());

        let targets = match role {
            Role::Train => Some(labels.iter().filter_map(|label| label.targets).collect()),
            Role::Test => None,
        };
        Ok(FeatureTable {
            role,
            documents,
            targets,
        })
    }

    /// Build documents for both roles and store them in the cache
    pub fn run(&self, data: &PreparedData, cache: &dyn ArtifactCache) -> Result<PipelineOutput> {
        let train = self.documents(data, Role::Train)?;
        let test = self.documents(data, Role::Test)?;

        cache.store(Role::Train, &train.documents)?;
        cache.store(Role::Test, &test.documents)?;

        Ok(PipelineOutput { train, test })
    }

    /// Load previously stored documents for both roles
    pub fn load_cached(cache: &dyn ArtifactCache) -> Result<(FlattenedDocuments, FlattenedDocuments)> {
        let train = cache.load(Role::Train)?;
        let test = cache.load(Role::Test)?;
        Ok((train, test))
    }
}
