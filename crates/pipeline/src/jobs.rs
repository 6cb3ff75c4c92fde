use anyhow::Result;
use common::config::Config;
use common::error::PipelineError;
use common::types::{DailyMetricRow, SentimentRecord};
use std::path::PathBuf;
use std::time::Instant;

use crate::cleaner::{clean_sentiment, clean_trades, CleanTrades};
use crate::{charts, features, loader, merge, output, segmentation};

fn record_stage(stage: &'static str, start: Instant) {
    let ms = start.elapsed().as_secs_f64() * 1000.0;
    metrics::histogram!("pipeline_stage_duration_ms", "stage" => stage).record(ms);
    tracing::debug!(stage, ms, "stage finished");
}

/// Load both CSVs and clean them.
pub fn load_and_clean(cfg: &Config) -> Result<(Vec<SentimentRecord>, CleanTrades)> {
    let start = Instant::now();
    let sentiment_raw = loader::load_sentiment(&cfg.paths.sentiment_csv)?;
    let trades_raw = loader::load_trades(&cfg.paths.trades_csv)?;
    record_stage("load", start);

    let start = Instant::now();
    let sentiment = clean_sentiment(&sentiment_raw, &cfg.cleaning);
    let trades = clean_trades(&trades_raw, &cfg.cleaning)?;
    record_stage("clean", start);

    Ok((sentiment, trades))
}

/// Full feature pipeline: load, clean, aggregate per (date, account), merge with sentiment.
pub fn build_features(cfg: &Config) -> Result<Vec<DailyMetricRow>> {
    let (sentiment, trades) = load_and_clean(cfg)?;

    let start = Instant::now();
    let daily = features::create_daily_metrics(&trades);
    record_stage("aggregate", start);
    if daily.is_empty() {
        return Err(PipelineError::EmptyInput { dataset: "trader" }.into());
    }

    let start = Instant::now();
    let merged = merge::merge_with_sentiment(daily, &sentiment, &cfg.cleaning);
    record_stage("merge", start);

    Ok(merged)
}

pub fn run_features_job(cfg: &Config) -> Result<PathBuf> {
    let rows = build_features(cfg)?;
    let path = cfg.paths.final_features();
    output::write_features(&path, &rows)?;
    tracing::info!(rows = rows.len(), path = %path.display(), "final features saved");
    Ok(path)
}

pub fn run_clean_job(cfg: &Config) -> Result<(PathBuf, PathBuf)> {
    let (sentiment, trades) = load_and_clean(cfg)?;
    let sentiment_path = cfg.paths.cleaned_sentiment();
    let trades_path = cfg.paths.cleaned_trades();
    output::write_cleaned_sentiment(&sentiment_path, &sentiment)?;
    output::write_cleaned_trades(&trades_path, &trades.trades)?;
    Ok((sentiment_path, trades_path))
}

pub fn run_segments_job(cfg: &Config) -> Result<PathBuf> {
    let rows = output::read_features(&cfg.paths.final_features())?;
    let segments = segmentation::create_trader_segments(&rows);
    let path = cfg.paths.segments();
    output::write_segments(&path, &segments)?;
    tracing::info!(accounts = segments.len(), path = %path.display(), "trader segments saved");
    Ok(path)
}

pub fn run_charts_job(cfg: &Config) -> Result<Vec<PathBuf>> {
    let rows = output::read_features(&cfg.paths.final_features())?;
    charts::write_charts(&rows, &cfg.paths.charts_dir())
}
