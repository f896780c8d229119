//! Readers for the raw input files.
//!
//! Yelp dumps are line-delimited JSON (one object per line); the inspection
//! tables and the id crosswalk are CSV. Readers only parse; field mapping is
//! left to [`crate::normalize`].

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::config::DataConfig;
use crate::crosswalk::CrosswalkEntry;
use crate::error::{PipelineError, Result};
use crate::models::{CanonicalId, ExternalId, RawRecord};

/// Every raw input of a pipeline run
#[derive(Debug, Clone, Default)]
pub struct RawDatasets {
    /// Crosswalk rows
    pub crosswalk: Vec<CrosswalkEntry>,
    /// Review objects
    pub reviews: Vec<RawRecord>,
    /// Tip objects
    pub tips: Vec<RawRecord>,
    /// User objects
    pub users: Vec<RawRecord>,
    /// Business objects
    pub businesses: Vec<RawRecord>,
    /// Check-in objects
    pub checkins: Vec<RawRecord>,
    /// Training label rows
    pub train_labels: Vec<RawRecord>,
    /// Submission rows
    pub submission: Vec<RawRecord>,
}

/// Read one JSON object per line; blank lines are skipped
pub fn read_json_lines<R: BufRead>(reader: R) -> Result<Vec<RawRecord>> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: RawRecord =
            serde_json::from_str(&line).map_err(|source| PipelineError::JsonLine {
                line: i + 1,
                source,
            })?;
        records.push(record);
    }
    Ok(records)
}

/// Read a headed CSV into records of strings; empty cells become null
pub fn read_csv_records<R: Read>(reader: R) -> Result<Vec<RawRecord>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let mut records = Vec::new();
    for row in csv_reader.records() {
        let row = row?;
        let record: RawRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(name, cell)| {
                let value = if cell.trim().is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                (name.to_string(), value)
            })
            .collect();
        records.push(record);
    }
    Ok(records)
}

/// Read the crosswalk: first column canonical id, remaining columns external
/// ids (blank when the restaurant has fewer)
pub fn read_crosswalk<R: Read>(reader: R) -> Result<Vec<CrosswalkEntry>> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let mut entries = Vec::new();
    for row in csv_reader.records() {
        let row = row?;
        let mut cells = row.iter().map(str::trim);
        let Some(canonical) = cells.next().filter(|c| !c.is_empty()) else {
            continue;
        };
        let externals = cells
            .filter(|c| !c.is_empty())
            .map(ExternalId::new)
            .collect();
        entries.push(CrosswalkEntry::new(CanonicalId::new(canonical), externals)?);
    }
    Ok(entries)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| {
        std::io::Error::new(e.kind(), format!("{}: {e}", path.display()))
    })?;
    Ok(BufReader::new(file))
}

/// Load every source named in the data configuration
pub fn load_datasets(config: &DataConfig) -> Result<RawDatasets> {
    let datasets = RawDatasets {
        crosswalk: read_crosswalk(open(Path::new(&config.crosswalk))?)?,
        reviews: read_json_lines(open(Path::new(&config.reviews))?)?,
        tips: read_json_lines(open(Path::new(&config.tips))?)?,
        users: read_json_lines(open(Path::new(&config.users))?)?,
        businesses: read_json_lines(open(Path::new(&config.businesses))?)?,
        checkins: read_json_lines(open(Path::new(&config.checkins))?)?,
        train_labels: read_csv_records(open(Path::new(&config.train_labels))?)?,
        submission: read_csv_records(open(Path::new(&config.submission))?)?,
    };

    info!(
        crosswalk = datasets.crosswalk.len(),
        reviews = datasets.reviews.len(),
        tips = datasets.tips.len(),
        users = datasets.users.len(),
        businesses = datasets.businesses.len(),
        checkins = datasets.checkins.len(),
        train_labels = datasets.train_labels.len(),
        submission = datasets.submission.len(),
        "Loaded raw datasets"
    );
    Ok(datasets)
}
