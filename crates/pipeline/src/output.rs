use anyhow::{Context, Result};
use common::types::{DailyMetricRow, SentimentRecord, TradeRecord};
use csv::Writer;
use serde::Serialize;
use std::path::Path;

use crate::segmentation::TraderSegment;

/// Serialize `rows` as CSV with a header row, creating parent directories as needed.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut writer = Writer::from_path(path)
        .with_context(|| format!("failed to create CSV file: {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    tracing::info!(path = %path.display(), rows = rows.len(), "CSV written");
    Ok(())
}

pub fn write_features(path: &Path, rows: &[DailyMetricRow]) -> Result<()> {
    write_csv(path, rows)
}

pub fn write_cleaned_sentiment(path: &Path, rows: &[SentimentRecord]) -> Result<()> {
    write_csv(path, rows)
}

pub fn write_cleaned_trades(path: &Path, rows: &[TradeRecord]) -> Result<()> {
    write_csv(path, rows)
}

pub fn write_segments(path: &Path, rows: &[TraderSegment]) -> Result<()> {
    write_csv(path, rows)
}

/// Read a features table previously written by [`write_features`].
pub fn read_features(path: &Path) -> Result<Vec<DailyMetricRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open features CSV: {}", path.display()))?;
    let rows = reader
        .deserialize()
        .enumerate()
        .map(|(i, r)| r.with_context(|| format!("bad features row {}", i + 1)))
        .collect::<Result<Vec<DailyMetricRow>>>()?;
    tracing::info!(path = %path.display(), rows = rows.len(), "features loaded");
    Ok(rows)
}
