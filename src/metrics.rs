use metrics::{counter, gauge, histogram};
use std::time::Duration;

use crate::join::JoinStats;
use crate::models::{FlattenedDocuments, Role, SourceKind};

/// Metric names recorded by the pipeline
#[derive(Debug, Clone, Copy)]
pub struct MetricsCollector {
    // Normalization metrics
    pub records_normalized_total: &'static str,

    // Crosswalk and join metrics
    pub crosswalk_size: &'static str,
    pub crosswalk_collisions: &'static str,
    pub rows_unresolved_total: &'static str,
    pub join_rows: &'static str,

    // Temporal filter metrics
    pub rows_future_removed_total: &'static str,

    // Flattening metrics
    pub documents_built_total: &'static str,
    pub documents_empty_total: &'static str,

    // Timing
    pub stage_duration: &'static str,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            records_normalized_total: "inspection_features_records_normalized_total",

            crosswalk_size: "inspection_features_crosswalk_external_ids",
            crosswalk_collisions: "inspection_features_crosswalk_collisions",
            rows_unresolved_total: "inspection_features_rows_unresolved_total",
            join_rows: "inspection_features_join_rows",

            rows_future_removed_total: "inspection_features_rows_future_removed_total",

            documents_built_total: "inspection_features_documents_built_total",
            documents_empty_total: "inspection_features_documents_empty_total",

            stage_duration: "inspection_features_stage_duration_seconds",
        }
    }
}

impl MetricsCollector {
    /// Record how many records a source normalized into
    pub fn record_normalized(&self, source: SourceKind, count: usize) {
        counter!(self.records_normalized_total, "source" => source.name()).increment(count as u64);
    }

    /// Record crosswalk shape
    #[allow(clippy::cast_precision_loss)]
    pub fn record_crosswalk(&self, external_ids: usize, collisions: usize) {
        gauge!(self.crosswalk_size).set(external_ids as f64);
        gauge!(self.crosswalk_collisions).set(collisions as f64);
    }

    /// Record events dropped because their business is not in the crosswalk
    pub fn record_unresolved(&self, stage: &'static str, count: usize) {
        counter!(self.rows_unresolved_total, "stage" => stage).increment(count as u64);
    }

    /// Record row counts through the join chain
    #[allow(clippy::cast_precision_loss)]
    pub fn record_join(&self, stats: &JoinStats) {
        self.record_unresolved("join", stats.unresolved);
        for (stage, rows) in [
            ("events", stats.events),
            ("users", stats.with_users),
            ("businesses", stats.with_businesses),
            ("checkins", stats.with_checkins),
            ("labels", stats.pairs),
        ] {
            gauge!(self.join_rows, "stage" => stage).set(rows as f64);
        }
    }

    /// Record rows removed by the no-future filter
    pub fn record_future_removed(&self, count: usize) {
        counter!(self.rows_future_removed_total).increment(count as u64);
    }

    /// Record documents built for a role
    pub fn record_documents(&self, role: Role, documents: &FlattenedDocuments) {
        counter!(self.documents_built_total, "role" => role.name()).increment(documents.len() as u64);
        counter!(self.documents_empty_total, "role" => role.name())
            .increment(documents.empty_count() as u64);
    }

    /// Record how long a stage took
    pub fn record_stage(&self, stage: &'static str, duration: Duration) {
        histogram!(self.stage_duration, "stage" => stage).record(duration.as_secs_f64());
    }
}
