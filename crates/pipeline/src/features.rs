use chrono::NaiveDate;
use common::types::{DailyMetrics, TradeRecord};
use std::collections::{BTreeMap, HashMap};

use crate::cleaner::CleanTrades;

#[derive(Debug, Default)]
struct DayAccumulator {
    pnl: f64,
    volume: f64,
    leverage: f64,
    count: u32,
    wins: u32,
    longs: u32,
    max_drawdown: f64,
}

/// Round half to even at two decimals, as dataframe `round(2)` does.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}

fn pct(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole) * 100.0
    }
}

/// Per-trade drawdown: each account's cumulative PnL, accumulated in input order, minus its
/// running maximum. Returned values line up with `trades`.
pub fn trade_drawdowns(trades: &[&TradeRecord]) -> Vec<f64> {
    let mut running: HashMap<&str, (f64, f64)> = HashMap::new();
    trades
        .iter()
        .map(|t| {
            let (cumulative, peak) = running
                .entry(t.account.as_str())
                .or_insert((0.0, f64::NEG_INFINITY));
            *cumulative += t.closed_pnl;
            *peak = peak.max(*cumulative);
            *cumulative - *peak
        })
        .collect()
}

/// Aggregate trades into one row per (date, account), ordered by date then account.
///
/// Trades without an account are dropped. Undated trades still count toward their account's
/// running PnL for drawdown but are left out of the daily groups.
pub fn create_daily_metrics(clean: &CleanTrades) -> Vec<DailyMetrics> {
    let with_account: Vec<&TradeRecord> = clean
        .trades
        .iter()
        .filter(|t| !t.account.is_empty())
        .collect();
    let drawdowns = trade_drawdowns(&with_account);

    let dropped = clean.trades.len() - with_account.iter().filter(|t| t.date.is_some()).count();
    if dropped > 0 {
        tracing::warn!(dropped, "trades without date or account excluded from aggregation");
    }

    let mut groups: BTreeMap<(NaiveDate, &str), DayAccumulator> = BTreeMap::new();
    for (t, dd) in with_account.iter().zip(drawdowns) {
        let Some(date) = t.date else { continue };
        let acc = groups.entry((date, t.account.as_str())).or_default();
        acc.pnl += t.closed_pnl;
        acc.volume += t.size;
        acc.leverage += t.leverage;
        acc.count += 1;
        acc.wins += u32::from(t.is_winner());
        acc.longs += u32::from(t.is_long());
        acc.max_drawdown = acc.max_drawdown.min(dd);
    }

    let rows: Vec<DailyMetrics> = groups
        .into_iter()
        .map(|((date, account), acc)| {
            let n = f64::from(acc.count);
            DailyMetrics {
                date,
                account: account.to_string(),
                total_pnl: round2(acc.pnl),
                total_volume: round2(acc.volume),
                avg_trade_size: round2(acc.volume / n),
                trade_count: acc.count,
                avg_leverage: round2(acc.leverage / n),
                win_rate: pct(acc.wins, acc.count),
                long_pct: if clean.has_side {
                    pct(acc.longs, acc.count)
                } else {
                    0.0
                },
                max_drawdown: acc.max_drawdown,
            }
        })
        .collect();

    metrics::counter!("pipeline_daily_rows_total").increment(rows.len() as u64);
    tracing::info!(rows = rows.len(), "daily metrics computed");
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn trade(account: &str, at: Option<NaiveDateTime>, pnl: f64, side: &str) -> TradeRecord {
        TradeRecord {
            account: account.to_string(),
            timestamp: at,
            date: at.map(|t| t.date()),
            closed_pnl: pnl,
            size: 100.0,
            side: Some(side.to_string()),
            leverage: 2.0,
            coin: None,
        }
    }

    fn clean(trades: Vec<TradeRecord>) -> CleanTrades {
        CleanTrades {
            trades,
            has_side: true,
        }
    }

    #[test]
    fn test_single_day_example() {
        let rows = create_daily_metrics(&clean(vec![
            trade("0xabc", Some(ts(1, 1)), 10.0, "BUY"),
            trade("0xabc", Some(ts(1, 2)), -5.0, "SELL"),
            trade("0xabc", Some(ts(1, 3)), 3.0, "BUY"),
        ]));
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert!((r.total_pnl - 8.0).abs() < 1e-9);
        assert_eq!(r.trade_count, 3);
        assert!((r.win_rate - 66.666_666).abs() < 1e-3);
        assert!((r.long_pct - 66.666_666).abs() < 1e-3);
        assert!((r.total_volume - 300.0).abs() < 1e-9);
        assert!((r.avg_trade_size - 100.0).abs() < 1e-9);
        assert!((r.avg_leverage - 2.0).abs() < 1e-9);
        assert!((r.max_drawdown + 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_groups_by_date_and_account_in_order() {
        let rows = create_daily_metrics(&clean(vec![
            trade("0xdef", Some(ts(2, 1)), 1.0, "BUY"),
            trade("0xabc", Some(ts(2, 1)), 1.0, "BUY"),
            trade("0xabc", Some(ts(1, 1)), 1.0, "BUY"),
            trade("0xabc", None, 100.0, "BUY"),
            trade("", Some(ts(1, 1)), 1.0, "BUY"),
        ]));
        let keys: Vec<(u32, &str)> = rows
            .iter()
            .map(|r| (chrono::Datelike::day(&r.date), r.account.as_str()))
            .collect();
        assert_eq!(keys, vec![(1, "0xabc"), (2, "0xabc"), (2, "0xdef")]);
    }

    #[test]
    fn test_drawdown_follows_file_order() {
        // Day 2 comes first in the file, so it sets the peak before day 1's loss.
        let rows = create_daily_metrics(&clean(vec![
            trade("0xabc", Some(ts(2, 1)), 50.0, "BUY"),
            trade("0xabc", Some(ts(1, 1)), -30.0, "SELL"),
            trade("0xabc", Some(ts(3, 1)), 40.0, "BUY"),
        ]));
        let dd: Vec<f64> = rows.iter().map(|r| r.max_drawdown).collect();
        assert_eq!(dd, vec![-30.0, 0.0, 0.0]);
    }

    #[test]
    fn test_undated_trades_feed_drawdown() {
        let rows = create_daily_metrics(&clean(vec![
            trade("0xabc", Some(ts(1, 1)), 10.0, "BUY"),
            trade("0xabc", None, -50.0, "SELL"),
            trade("0xabc", Some(ts(2, 1)), 5.0, "BUY"),
        ]));
        let dd: Vec<f64> = rows.iter().map(|r| r.max_drawdown).collect();
        assert_eq!(dd, vec![0.0, -45.0]);
        assert_eq!(rows[1].trade_count, 1);
        assert!((rows[1].total_pnl - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_drawdown_is_tracked_per_account() {
        let trades = [
            trade("0xa", Some(ts(1, 1)), 10.0, "BUY"),
            trade("0xb", Some(ts(1, 1)), -4.0, "BUY"),
            trade("0xa", Some(ts(1, 2)), -3.0, "SELL"),
            trade("0xb", Some(ts(1, 2)), 1.0, "SELL"),
        ];
        let refs: Vec<&TradeRecord> = trades.iter().collect();
        assert_eq!(trade_drawdowns(&refs), vec![0.0, 0.0, -3.0, 0.0]);
    }

    #[test]
    fn test_first_losing_trade_is_its_own_peak() {
        let trades = [trade("0xabc", Some(ts(1, 1)), -5.0, "SELL")];
        let refs: Vec<&TradeRecord> = trades.iter().collect();
        assert_eq!(trade_drawdowns(&refs), vec![0.0]);
    }

    #[test]
    fn test_long_pct_zero_without_side_column() {
        let mut c = clean(vec![trade("0xabc", Some(ts(1, 1)), 1.0, "BUY")]);
        c.has_side = false;
        let rows = create_daily_metrics(&c);
        assert!(rows[0].long_pct.abs() < f64::EPSILON);
    }

    #[test]
    fn test_percentages_and_drawdown_invariants() {
        let pnls = [3.0, -1.0, 0.0, -7.5, 12.0, -0.5, 2.25, -9.0];
        let trades: Vec<TradeRecord> = pnls
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let account = if i % 2 == 0 { "0xa" } else { "0xb" };
                let side = if i % 3 == 0 { "BUY" } else { "SELL" };
                trade(account, Some(ts(1 + (i as u32 % 3), 1)), p, side)
            })
            .collect();
        for r in create_daily_metrics(&clean(trades)) {
            assert!((0.0..=100.0).contains(&r.win_rate));
            assert!((0.0..=100.0).contains(&r.long_pct));
            assert!(r.max_drawdown <= 0.0);
        }
    }

    #[test]
    fn test_round2_is_half_even() {
        assert!((round2(2.345_678) - 2.35).abs() < 1e-12);
        assert!((round2(0.125) - 0.12).abs() < 1e-12);
    }
}
