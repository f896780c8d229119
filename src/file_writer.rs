//! File writing utilities for feature export.
//!
//! Writes flattened feature tables and the joined (event, inspection) table as
//! CSV or JSON.

use crate::error::Result;
use crate::join::JoinedTable;
use crate::models::{FeatureTable, OutputFormat};
use csv::Writer;
use std::collections::BTreeSet;
use std::fs::{create_dir_all, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Write a feature table to `output_dir/<role>_features.<ext>`.
///
/// # Returns
///
/// Path of the created file
pub fn write_feature_table(table: &FeatureTable, format: OutputFormat, output_dir: &Path) -> Result<PathBuf> {
    create_dir_all(output_dir)?;
    let file_path = output_dir.join(format!("{}_features.{}", table.role.name(), format.extension()));

    match format {
        OutputFormat::Csv => write_feature_csv(table, &file_path)?,
        OutputFormat::Json => write_feature_json(table, &file_path)?,
    }
    Ok(file_path)
}

/// Write the joined table to `file_path`
pub fn write_joined_table(table: &JoinedTable, format: OutputFormat, file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent() {
        create_dir_all(parent)?;
    }
    match format {
        OutputFormat::Csv => write_joined_csv(table, file_path),
        OutputFormat::Json => write_joined_json(table, file_path),
    }
}

/// Header: `inspection_id, text` plus the three targets when present
fn write_feature_csv(table: &FeatureTable, file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;
    let mut writer = Writer::from_writer(file);

    let mut header = vec!["inspection_id", "text"];
    if table.targets.is_some() {
        header.extend(["*", "**", "***"]);
    }
    writer.write_record(&header)?;

    for (i, (id, text)) in table.documents.iter().enumerate() {
        let mut row = vec![id.0.clone(), text.to_string()];
        if let Some(targets) = table.targets.as_ref().and_then(|t| t.get(i)) {
            row.push(targets.one_star.to_string());
            row.push(targets.two_star.to_string());
            row.push(targets.three_star.to_string());
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

fn write_feature_json(table: &FeatureTable, file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;
    let writer = BufWriter::new(file);

    let rows: Vec<serde_json::Value> = table
        .documents
        .iter()
        .enumerate()
        .map(|(i, (id, text))| {
            let mut row = serde_json::json!({
                "inspection_id": id.0,
                "text": text,
            });
            if let Some(targets) = table.targets.as_ref().and_then(|t| t.get(i)) {
                row["*"] = serde_json::json!(targets.one_star);
                row["**"] = serde_json::json!(targets.two_star);
                row["***"] = serde_json::json!(targets.three_star);
            }
            row
        })
        .collect();

    serde_json::to_writer_pretty(writer, &rows)?;
    Ok(())
}

/// Columns are the union over all rows, sorted; absent or missing cells are empty
fn write_joined_csv(table: &JoinedTable, file_path: &Path) -> Result<()> {
    let columns: BTreeSet<&str> = table.rows.iter().flat_map(|row| row.record.columns()).collect();

    let file = File::create(file_path)?;
    let mut writer = Writer::from_writer(file);
    writer.write_record(&columns)?;

    for row in &table.rows {
        writer.write_record(columns.iter().map(|column| {
            row.record
                .get(column)
                .map(crate::models::FieldValue::to_export_string)
                .unwrap_or_default()
        }))?;
    }

    writer.flush()?;
    Ok(())
}

fn write_joined_json(table: &JoinedTable, file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;
    let writer = BufWriter::new(file);

    let rows: Vec<serde_json::Value> = table
        .rows
        .iter()
        .map(|row| {
            let fields: serde_json::Map<String, serde_json::Value> = row
                .record
                .iter()
                .map(|(name, value)| {
                    let value = if value.is_missing() {
                        serde_json::Value::Null
                    } else {
                        serde_json::Value::String(value.to_export_string())
                    };
                    (name.to_string(), value)
                })
                .collect();
            serde_json::Value::Object(fields)
        })
        .collect();

    serde_json::to_writer_pretty(writer, &rows)?;
    Ok(())
}
