use chrono::NaiveDate;
use common::config::Cleaning;
use common::types::{DailyMetricRow, DailyMetrics, SentimentRecord};
use std::collections::HashMap;

/// Left-join daily metrics onto sentiment by date.
///
/// Sentiment is deduplicated by date (first row wins) so the join never fans out. Output is
/// sorted by date; sentiment gaps are forward-filled along that order and leading gaps take the
/// configured default classification and score.
pub fn merge_with_sentiment(
    mut metrics: Vec<DailyMetrics>,
    sentiment: &[SentimentRecord],
    cfg: &Cleaning,
) -> Vec<DailyMetricRow> {
    let mut by_date: HashMap<NaiveDate, &SentimentRecord> = HashMap::new();
    for s in sentiment {
        if let Some(date) = s.date {
            by_date.entry(date).or_insert(s);
        }
    }

    metrics.sort_by_key(|m| m.date);

    let mut matched = 0usize;
    let mut last: Option<(&str, f64)> = None;
    let merged: Vec<DailyMetricRow> = metrics
        .into_iter()
        .map(|m| {
            if let Some(s) = by_date.get(&m.date) {
                matched += 1;
                last = Some((s.classification.as_str(), s.sentiment_score));
            }
            let (classification, score) = last.unwrap_or((
                cfg.default_classification.as_str(),
                cfg.default_sentiment_score,
            ));
            m.with_sentiment(classification.to_string(), score)
        })
        .collect();

    metrics::gauge!("pipeline_merged_rows").set(merged.len() as f64);
    tracing::info!(
        rows = merged.len(),
        matched,
        unique_sentiment_days = by_date.len(),
        "merged metrics with sentiment"
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn metric(d: u32, account: &str) -> DailyMetrics {
        DailyMetrics {
            date: day(d),
            account: account.to_string(),
            total_pnl: 1.0,
            total_volume: 10.0,
            avg_trade_size: 10.0,
            trade_count: 1,
            avg_leverage: 1.0,
            win_rate: 100.0,
            long_pct: 100.0,
            max_drawdown: 0.0,
        }
    }

    fn sentiment(d: Option<u32>, class: &str, score: f64) -> SentimentRecord {
        SentimentRecord {
            date: d.map(day),
            classification: class.to_string(),
            sentiment_score: score,
        }
    }

    #[test]
    fn test_merge_preserves_row_count_with_duplicate_sentiment() {
        let metrics = vec![metric(1, "a"), metric(1, "b"), metric(2, "a")];
        let sent = vec![
            sentiment(Some(1), "Fear", 20.0),
            sentiment(Some(1), "Greed", 80.0),
            sentiment(Some(2), "Greed", 75.0),
        ];
        let merged = merge_with_sentiment(metrics, &sent, &Cleaning::default());
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].classification, "Fear");
        assert_eq!(merged[1].classification, "Fear");
        assert_eq!(merged[2].classification, "Greed");
    }

    #[test]
    fn test_forward_fill_and_leading_default() {
        let metrics = vec![metric(3, "a"), metric(1, "a"), metric(2, "a"), metric(4, "a")];
        let sent = vec![sentiment(Some(2), "Extreme Greed", 91.0), sentiment(None, "Fear", 5.0)];
        let merged = merge_with_sentiment(metrics, &sent, &Cleaning::default());

        let got: Vec<(NaiveDate, &str, f64)> = merged
            .iter()
            .map(|r| (r.date, r.classification.as_str(), r.sentiment_score))
            .collect();
        assert_eq!(
            got,
            vec![
                (day(1), "Neutral", 50.0),
                (day(2), "Extreme Greed", 91.0),
                (day(3), "Extreme Greed", 91.0),
                (day(4), "Extreme Greed", 91.0),
            ]
        );
    }

    #[test]
    fn test_empty_sentiment_defaults_everything() {
        let merged = merge_with_sentiment(vec![metric(1, "a")], &[], &Cleaning::default());
        assert_eq!(merged[0].classification, "Neutral");
        assert!((merged[0].sentiment_score - 50.0).abs() < f64::EPSILON);
    }
}
