use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One cleaned row of the Fear & Greed index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentRecord {
    #[serde(rename = "Date")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "Classification")]
    pub classification: String,
    #[serde(rename = "Sentiment_Score")]
    pub sentiment_score: f64,
}

/// One cleaned trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub account: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: Option<NaiveDateTime>,
    #[serde(rename = "Date")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "closedPnL")]
    pub closed_pnl: f64,
    pub size: f64,
    pub side: Option<String>,
    pub leverage: f64,
    #[serde(rename = "Coin")]
    pub coin: Option<String>,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.closed_pnl > 0.0
    }

    pub fn is_long(&self) -> bool {
        self.side
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("buy"))
    }
}

/// Per (date, account) aggregate before the sentiment join.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyMetrics {
    pub date: NaiveDate,
    pub account: String,
    pub total_pnl: f64,
    pub total_volume: f64,
    pub avg_trade_size: f64,
    pub trade_count: u32,
    pub avg_leverage: f64,
    pub win_rate: f64,
    pub long_pct: f64,
    pub max_drawdown: f64,
}

impl DailyMetrics {
    pub fn with_sentiment(self, classification: String, sentiment_score: f64) -> DailyMetricRow {
        DailyMetricRow {
            date: self.date,
            account: self.account,
            total_pnl: self.total_pnl,
            total_volume: self.total_volume,
            avg_trade_size: self.avg_trade_size,
            trade_count: self.trade_count,
            avg_leverage: self.avg_leverage,
            win_rate: self.win_rate,
            long_pct: self.long_pct,
            max_drawdown: self.max_drawdown,
            classification,
            sentiment_score,
        }
    }
}

/// Terminal artifact: one row per (date, account) with that day's sentiment attached.
///
/// Column names match the `final_features.csv` header consumed by charts, segments and the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetricRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    pub account: String,
    pub total_pnl: f64,
    pub total_volume: f64,
    pub avg_trade_size: f64,
    pub trade_count: u32,
    pub avg_leverage: f64,
    pub win_rate: f64,
    pub long_pct: f64,
    pub max_drawdown: f64,
    #[serde(rename = "Classification")]
    pub classification: String,
    #[serde(rename = "Sentiment_Score")]
    pub sentiment_score: f64,
}
