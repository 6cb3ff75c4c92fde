//! View models for dashboard templates.
//! Plain structs with display-ready strings; filtering and aggregation over the merged table live
//! here, rendering lives in the templates.

use chrono::NaiveDate;
use common::types::DailyMetricRow;
use pipeline::charts::SentimentSummary;
use std::collections::BTreeSet;

/// Rows shown in the data table.
pub const TABLE_LIMIT: usize = 100;

/// Query-string filter. Empty `sentiments` means every classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub sentiments: Vec<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl Filter {
    /// Build from decoded query pairs. `sentiment` may repeat or carry a comma-separated list;
    /// unparseable dates are ignored.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut filter = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "sentiment" => filter.sentiments.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                ),
                "start" => filter.start = parse_day(value, key),
                "end" => filter.end = parse_day(value, key),
                _ => {}
            }
        }
        filter
    }

    pub fn matches(&self, row: &DailyMetricRow) -> bool {
        (self.sentiments.is_empty() || self.sentiments.contains(&row.classification))
            && self.start.is_none_or(|s| row.date >= s)
            && self.end.is_none_or(|e| row.date <= e)
    }

    pub fn apply<'a>(&self, rows: &'a [DailyMetricRow]) -> Vec<&'a DailyMetricRow> {
        rows.iter().filter(|r| self.matches(r)).collect()
    }
}

fn parse_day(value: &str, key: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) => {
            tracing::warn!(param = key, value, "ignoring unparseable date filter");
            None
        }
    }
}

/// One checkbox in the sentiment filter.
pub struct SentimentOption {
    pub label: String,
    pub checked: bool,
}

pub fn sentiment_options(rows: &[DailyMetricRow], filter: &Filter) -> Vec<SentimentOption> {
    rows.iter()
        .map(|r| r.classification.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|label| SentimentOption {
            label: label.to_string(),
            checked: filter.sentiments.is_empty() || filter.sentiments.iter().any(|s| s == label),
        })
        .collect()
}

/// Headline numbers over the filtered rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Kpis {
    pub total_pnl: f64,
    pub avg_win_rate: f64,
    pub avg_leverage: f64,
    pub total_trades: u64,
}

impl Kpis {
    #[allow(clippy::cast_precision_loss)]
    pub fn from_rows(rows: &[&DailyMetricRow]) -> Self {
        let n = rows.len() as f64;
        let avg = |f: fn(&DailyMetricRow) -> f64| {
            if rows.is_empty() {
                0.0
            } else {
                rows.iter().map(|r| f(r)).sum::<f64>() / n
            }
        };
        Self {
            total_pnl: rows.iter().map(|r| r.total_pnl).sum(),
            avg_win_rate: avg(|r| r.win_rate),
            avg_leverage: avg(|r| r.avg_leverage),
            total_trades: rows.iter().map(|r| u64::from(r.trade_count)).sum(),
        }
    }

    pub fn total_pnl_display(&self) -> String {
        format!("${:.2}", self.total_pnl)
    }

    pub fn avg_win_rate_display(&self) -> String {
        format!("{:.1}%", self.avg_win_rate)
    }

    pub fn avg_leverage_display(&self) -> String {
        format!("{:.2}x", self.avg_leverage)
    }

    pub fn pnl_color(&self) -> &'static str {
        pnl_color(self.total_pnl)
    }
}

fn pnl_color(pnl: f64) -> &'static str {
    if pnl > 0.0 {
        "text-green-600"
    } else if pnl < 0.0 {
        "text-red-600"
    } else {
        "text-gray-700"
    }
}

/// Row in the "behavior by sentiment" table.
pub struct BehaviorRow {
    pub classification: String,
    pub days: usize,
    pub mean_trade_count: String,
    pub mean_leverage: String,
    pub mean_trade_size: String,
}

pub fn behavior_rows(summaries: &[SentimentSummary]) -> Vec<BehaviorRow> {
    summaries
        .iter()
        .map(|s| BehaviorRow {
            classification: s.classification.clone(),
            days: s.rows,
            mean_trade_count: format!("{:.2}", s.mean_trade_count),
            mean_leverage: format!("{:.2}", s.mean_leverage),
            mean_trade_size: format!("{:.2}", s.mean_trade_size),
        })
        .collect()
}

/// Row in the raw data table.
pub struct TableRow {
    pub date: String,
    pub account_short: String,
    pub account: String,
    pub total_pnl: String,
    pub pnl_color: &'static str,
    pub trade_count: u32,
    pub win_rate: String,
    pub avg_leverage: String,
    pub long_pct: String,
    pub max_drawdown: String,
    pub classification: String,
    pub sentiment_score: String,
}

fn short_account(account: &str) -> String {
    if account.len() > 12 && account.is_ascii() {
        format!("{}…{}", &account[..6], &account[account.len() - 4..])
    } else {
        account.to_string()
    }
}

impl From<&DailyMetricRow> for TableRow {
    fn from(r: &DailyMetricRow) -> Self {
        Self {
            date: r.date.to_string(),
            account_short: short_account(&r.account),
            account: r.account.clone(),
            total_pnl: format!("{:.2}", r.total_pnl),
            pnl_color: pnl_color(r.total_pnl),
            trade_count: r.trade_count,
            win_rate: format!("{:.1}", r.win_rate),
            avg_leverage: format!("{:.2}", r.avg_leverage),
            long_pct: format!("{:.1}", r.long_pct),
            max_drawdown: format!("{:.2}", r.max_drawdown),
            classification: r.classification.clone(),
            sentiment_score: format!("{:.0}", r.sentiment_score),
        }
    }
}

pub fn table_rows(rows: &[&DailyMetricRow]) -> Vec<TableRow> {
    rows.iter().take(TABLE_LIMIT).map(|r| TableRow::from(*r)).collect()
}
