use common::types::DailyMetricRow;
use serde::Serialize;
use std::collections::BTreeMap;

/// Right-closed interval `(lower, upper]` with a label.
#[derive(Debug, Clone, Copy)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub label: &'static str,
}

pub const LEVERAGE_BINS: &[Bin] = &[
    Bin { lower: 0.0, upper: 3.0, label: "Low (1-3x)" },
    Bin { lower: 3.0, upper: 10.0, label: "Medium (3-10x)" },
    Bin { lower: 10.0, upper: 100.0, label: "High (>10x)" },
];

pub const FREQUENCY_BINS: &[Bin] = &[
    Bin { lower: 0.0, upper: 10.0, label: "Infrequent" },
    Bin { lower: 10.0, upper: 50.0, label: "Regular" },
    Bin { lower: 50.0, upper: f64::INFINITY, label: "Frequent" },
];

pub const PERFORMANCE_BINS: &[Bin] = &[
    Bin { lower: 0.0, upper: 40.0, label: "Low Win Rate" },
    Bin { lower: 40.0, upper: 60.0, label: "Medium Win Rate" },
    Bin { lower: 60.0, upper: 100.0, label: "High Win Rate" },
];

/// Label of the bin containing `value`; `None` for values outside every bin (including NaN).
pub fn cut(value: f64, bins: &[Bin]) -> Option<&'static str> {
    bins.iter()
        .find(|b| value > b.lower && value <= b.upper)
        .map(|b| b.label)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraderSegment {
    pub account: String,
    pub total_pnl: f64,
    pub avg_leverage: f64,
    pub trade_count: u64,
    pub win_rate: f64,
    pub leverage_segment: Option<&'static str>,
    pub frequency_segment: Option<&'static str>,
    pub performance_segment: Option<&'static str>,
}

#[derive(Default)]
struct AccountTotals {
    pnl: f64,
    leverage_sum: f64,
    trades: u64,
    win_rate_sum: f64,
    days: u32,
}

/// Collapse the daily table to one row per account and bucket it by leverage, activity and
/// win rate. Accounts come out sorted.
pub fn create_trader_segments(rows: &[DailyMetricRow]) -> Vec<TraderSegment> {
    let mut by_account: BTreeMap<&str, AccountTotals> = BTreeMap::new();
    for r in rows {
        let t = by_account.entry(r.account.as_str()).or_default();
        t.pnl += r.total_pnl;
        t.leverage_sum += r.avg_leverage;
        t.trades += u64::from(r.trade_count);
        t.win_rate_sum += r.win_rate;
        t.days += 1;
    }

    by_account
        .into_iter()
        .map(|(account, t)| {
            let days = f64::from(t.days);
            let avg_leverage = t.leverage_sum / days;
            let win_rate = t.win_rate_sum / days;
            #[allow(clippy::cast_precision_loss)]
            let trade_count = t.trades as f64;
            TraderSegment {
                account: account.to_string(),
                total_pnl: t.pnl,
                avg_leverage,
                trade_count: t.trades,
                win_rate,
                leverage_segment: cut(avg_leverage, LEVERAGE_BINS),
                frequency_segment: cut(trade_count, FREQUENCY_BINS),
                performance_segment: cut(win_rate, PERFORMANCE_BINS),
            }
        })
        .collect()
}
