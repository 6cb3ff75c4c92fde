use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use common::config::Cleaning;
use common::error::PipelineError;
use common::types::{SentimentRecord, TradeRecord};

use crate::loader::RawTable;

const SENTIMENT_DATE_COLUMNS: &[&str] = &["date", "Date"];
const SENTIMENT_CLASS_COLUMNS: &[&str] = &["classification", "Classification"];
const SENTIMENT_VALUE_COLUMNS: &[&str] = &["value"];

const TRADE_TIMESTAMP_COLUMNS: &[&str] = &["Timestamp IST", "Timestamp"];
const TRADE_ACCOUNT_COLUMNS: &[&str] = &["Account", "account"];
const TRADE_PNL_COLUMNS: &[&str] = &["Closed PnL", "closedPnL"];
const TRADE_SIZE_COLUMNS: &[&str] = &["Size USD", "size"];
const TRADE_SIDE_COLUMNS: &[&str] = &["Side", "side"];
const TRADE_LEVERAGE_COLUMNS: &[&str] = &["Leverage", "leverage"];
const TRADE_COIN_COLUMNS: &[&str] = &["Coin", "coin"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%m/%d/%Y", "%Y/%m/%d"];

/// Epoch values at or above this are read as milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// Cleaned trades plus whether the source carried a side column at all.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanTrades {
    pub trades: Vec<TradeRecord>,
    pub has_side: bool,
}

/// Lenient timestamp parsing: ISO/RFC 3339, day-first dashed exports, US slashed dates, or epoch
/// seconds/milliseconds. Returns `None` when nothing matches.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(n) = s.parse::<f64>() {
        if !n.is_finite() {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        let dt = if n.abs() >= EPOCH_MILLIS_THRESHOLD {
            DateTime::from_timestamp_millis(n as i64)
        } else {
            DateTime::from_timestamp(n as i64, 0)
        };
        return dt.map(|d| d.naive_utc());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_datetime(raw).map(|dt| dt.date())
}

/// Numeric coercion; anything unparseable (or NaN) is `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

pub fn clean_sentiment(table: &RawTable, cfg: &Cleaning) -> Vec<SentimentRecord> {
    let date_col = table.first_column(SENTIMENT_DATE_COLUMNS);
    let class_col = table.first_column(SENTIMENT_CLASS_COLUMNS);
    let value_col = table.first_column(SENTIMENT_VALUE_COLUMNS);

    if date_col.is_none() {
        tracing::warn!("sentiment data has no date column; every row will miss the join");
    }

    let mut unparsed = 0u64;
    let records: Vec<SentimentRecord> = (0..table.rows.len())
        .map(|i| {
            let date = date_col.and_then(|c| table.cell(i, c)).and_then(parse_date);
            if date.is_none() {
                unparsed += 1;
            }

            let classification = class_col
                .and_then(|c| table.cell(i, c))
                .map_or_else(|| cfg.default_classification.clone(), str::to_string);

            let score = match value_col {
                Some(c) => table
                    .cell(i, c)
                    .and_then(parse_number)
                    .unwrap_or(cfg.default_sentiment_score),
                None => cfg.score_for(&classification),
            };

            SentimentRecord {
                date,
                classification,
                sentiment_score: score.clamp(0.0, 100.0),
            }
        })
        .collect();

    if unparsed > 0 {
        tracing::warn!(rows = unparsed, "sentiment rows with unparseable date");
        metrics::counter!("pipeline_unparsed_dates_total", "dataset" => "sentiment")
            .increment(unparsed);
    }
    tracing::info!(rows = records.len(), "sentiment cleaned");
    records
}

pub fn clean_trades(table: &RawTable, cfg: &Cleaning) -> Result<CleanTrades> {
    let ts_col = table
        .first_column(TRADE_TIMESTAMP_COLUMNS)
        .ok_or(PipelineError::MissingColumn {
            dataset: "trader",
            column: "Timestamp",
        })?;
    let account_col = table
        .first_column(TRADE_ACCOUNT_COLUMNS)
        .ok_or(PipelineError::MissingColumn {
            dataset: "trader",
            column: "Account",
        })?;
    let pnl_col = table.first_column(TRADE_PNL_COLUMNS);
    let size_col = table.first_column(TRADE_SIZE_COLUMNS);
    let side_col = table.first_column(TRADE_SIDE_COLUMNS);
    let leverage_col = table.first_column(TRADE_LEVERAGE_COLUMNS);
    let coin_col = table.first_column(TRADE_COIN_COLUMNS);

    let number_or = |i: usize, col: Option<usize>, default: f64| {
        col.and_then(|c| table.cell(i, c))
            .and_then(parse_number)
            .unwrap_or(default)
    };
    let text = |i: usize, col: Option<usize>| col.and_then(|c| table.cell(i, c)).map(str::to_string);

    let mut unparsed = 0u64;
    let trades: Vec<TradeRecord> = (0..table.rows.len())
        .map(|i| {
            let timestamp = table.cell(i, ts_col).and_then(parse_datetime);
            if timestamp.is_none() {
                unparsed += 1;
            }
            TradeRecord {
                account: table.cell(i, account_col).unwrap_or_default().to_string(),
                timestamp,
                date: timestamp.map(|t| t.date()),
                closed_pnl: number_or(i, pnl_col, 0.0),
                size: number_or(i, size_col, 0.0),
                side: text(i, side_col),
                leverage: number_or(i, leverage_col, cfg.default_leverage),
                coin: text(i, coin_col),
            }
        })
        .collect();

    if unparsed > 0 {
        tracing::warn!(rows = unparsed, "trades with unparseable timestamp");
        metrics::counter!("pipeline_unparsed_dates_total", "dataset" => "trader")
            .increment(unparsed);
    }
    if side_col.is_none() {
        tracing::warn!("trader data has no side column; long_pct will be 0");
    }
    tracing::info!(rows = trades.len(), "trades cleaned");

    Ok(CleanTrades {
        trades,
        has_side: side_col.is_some(),
    })
}
