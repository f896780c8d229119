//! Inspection Features - Leakage-free Text Features for Inspections
//!
//! A Rust library that turns Yelp reviews, tips, users, businesses and
//! check-ins into per-inspection training and scoring features for restaurant
//! hygiene prediction.
//!
//! # Features
//!
//! - Resolve Yelp business ids to inspection restaurant ids through a crosswalk
//! - Normalize every source into one canonical column vocabulary
//! - Join events with users, businesses, check-ins and inspections
//! - Drop every event at or after the inspection it would describe
//! - Flatten prior review and tip text into one document per inspection
//! - Cache flattened documents per role (train/test)

/// Artifact cache for flattened documents
pub mod cache;
/// Configuration management
pub mod config;
/// External id crosswalk
pub mod crosswalk;
/// Error types
pub mod error;
/// Feature table export
pub mod file_writer;
/// Per-inspection text flattening
pub mod flatten;
/// Joins across sources
pub mod join;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Record normalization
pub mod normalize;
/// Pipeline orchestration
pub mod pipeline;
/// Raw input readers
pub mod sources;
/// No-future filter
pub mod temporal;

// Re-export key components for easier access
pub use cache::{ArtifactCache, SledArtifactCache};
pub use crosswalk::{CrosswalkEntry, CrosswalkResolver, Resolution};
pub use error::{PipelineError, Result};
pub use models::{CanonicalId, ExternalId, FeatureTable, FlattenedDocuments, LabelId, LabelRecord, Role};
pub use pipeline::{FeaturePipeline, PipelineSettings};
