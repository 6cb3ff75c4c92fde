//! Static SVG charts over the merged features table.
//!
//! Geometry is computed here; the askama templates only place pre-computed shapes.

use anyhow::{Context, Result};
use askama::Template;
use chrono::NaiveDate;
use common::types::DailyMetricRow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const PANEL_W: f64 = 380.0;
const PANEL_H: f64 = 300.0;
const MARGIN_LEFT: f64 = 64.0;
const MARGIN_RIGHT: f64 = 16.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 48.0;
const HEADER_H: f64 = 36.0;
const TICKS: usize = 5;

const PALETTE: &[&str] = &[
    "#4c72b0", "#dd8452", "#55a868", "#c44e52", "#8172b3", "#937860", "#da8bc3",
];

/// Per-classification aggregate of the merged table.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentSummary {
    pub classification: String,
    pub rows: usize,
    pub mean_pnl: f64,
    /// Standard error of the mean PnL; 0 with fewer than two rows.
    pub sem_pnl: f64,
    pub pnl_min: f64,
    pub pnl_q1: f64,
    pub pnl_median: f64,
    pub pnl_q3: f64,
    pub pnl_max: f64,
    pub mean_win_rate: f64,
    pub mean_trade_count: f64,
    pub mean_leverage: f64,
    pub mean_trade_size: f64,
    pub mean_long_pct: f64,
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[allow(clippy::cast_precision_loss)]
fn sem(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    (var / n as f64).sqrt()
}

/// Linear-interpolated quantile of an ascending slice.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = (n - 1) as f64 * q.clamp(0.0, 1.0);
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

pub fn summarize_by_sentiment(rows: &[DailyMetricRow]) -> Vec<SentimentSummary> {
    let mut groups: BTreeMap<&str, Vec<&DailyMetricRow>> = BTreeMap::new();
    for r in rows {
        groups.entry(r.classification.as_str()).or_default().push(r);
    }

    groups
        .into_iter()
        .map(|(classification, group)| {
            let column = |f: fn(&DailyMetricRow) -> f64| -> Vec<f64> {
                group.iter().map(|r| f(r)).collect()
            };
            let mut pnl = column(|r| r.total_pnl);
            pnl.sort_by(f64::total_cmp);

            SentimentSummary {
                classification: classification.to_string(),
                rows: group.len(),
                mean_pnl: mean(&pnl),
                sem_pnl: sem(&pnl),
                pnl_min: quantile(&pnl, 0.0),
                pnl_q1: quantile(&pnl, 0.25),
                pnl_median: quantile(&pnl, 0.5),
                pnl_q3: quantile(&pnl, 0.75),
                pnl_max: quantile(&pnl, 1.0),
                mean_win_rate: mean(&column(|r| r.win_rate)),
                mean_trade_count: mean(&column(|r| f64::from(r.trade_count))),
                mean_leverage: mean(&column(|r| r.avg_leverage)),
                mean_trade_size: mean(&column(|r| r.avg_trade_size)),
                mean_long_pct: mean(&column(|r| r.long_pct)),
            }
        })
        .collect()
}

/// One point of the per-date performance series.
#[derive(Debug, Clone, PartialEq)]
pub struct TimePoint {
    pub date: NaiveDate,
    pub daily_pnl: f64,
    pub cumulative_pnl: f64,
    /// First sentiment score seen for the date.
    pub sentiment_score: f64,
}

pub fn daily_timeseries(rows: &[DailyMetricRow]) -> Vec<TimePoint> {
    let mut by_date: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
    for r in rows {
        by_date
            .entry(r.date)
            .or_insert((0.0, r.sentiment_score))
            .0 += r.total_pnl;
    }

    let mut cumulative = 0.0;
    by_date
        .into_iter()
        .map(|(date, (daily_pnl, sentiment_score))| {
            cumulative += daily_pnl;
            TimePoint {
                date,
                daily_pnl,
                cumulative_pnl: cumulative,
                sentiment_score,
            }
        })
        .collect()
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn fmt_value(v: f64) -> String {
    if v.abs() >= 1000.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

#[derive(Clone, Copy)]
enum Axis {
    Linear,
    /// `sign(v) * log10(1 + |v|)`: linear near zero, logarithmic in the tails.
    SymLog,
}

impl Axis {
    fn forward(self, v: f64) -> f64 {
        match self {
            Self::Linear => v,
            Self::SymLog => v.signum() * v.abs().ln_1p() / std::f64::consts::LN_10,
        }
    }

    fn inverse(self, t: f64) -> f64 {
        match self {
            Self::Linear => t,
            Self::SymLog => t.signum() * (t.abs() * std::f64::consts::LN_10).exp_m1(),
        }
    }
}

/// Maps data values onto a vertical pixel range `[top, top + height]`. `lo` and `hi` are in
/// axis space.
struct Scale {
    axis: Axis,
    lo: f64,
    hi: f64,
    top: f64,
    height: f64,
}

impl Scale {
    fn new(values: impl IntoIterator<Item = f64>, top: f64, height: f64) -> Self {
        Self::with_axis(Axis::Linear, values, top, height)
    }

    fn with_axis(axis: Axis, values: impl IntoIterator<Item = f64>, top: f64, height: f64) -> Self {
        let (mut lo, mut hi) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .map(|v| axis.forward(v))
            .fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if hi - lo < f64::EPSILON {
            hi = lo + 1.0;
        }
        let pad = (hi - lo) * 0.05;
        if lo < 0.0 {
            lo -= pad;
        }
        hi += pad;
        Self {
            axis,
            lo,
            hi,
            top,
            height,
        }
    }

    fn y(&self, v: f64) -> f64 {
        let t = self.axis.forward(v);
        round1(self.top + (self.hi - t) / (self.hi - self.lo) * self.height)
    }

    #[allow(clippy::cast_precision_loss)]
    fn ticks(&self, x: f64) -> Vec<Tick> {
        (0..TICKS)
            .map(|i| {
                let t = self.lo + (self.hi - self.lo) * i as f64 / (TICKS - 1) as f64;
                let v = self.axis.inverse(t);
                Tick {
                    x,
                    y: self.y(v),
                    label: fmt_value(v),
                }
            })
            .collect()
    }
}

pub struct Tick {
    pub x: f64,
    pub y: f64,
    pub label: String,
}

pub struct Bar {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub center: f64,
    pub color: &'static str,
    pub value_label: String,
    pub label_y: f64,
    pub has_error: bool,
    pub err_top: f64,
    pub err_bottom: f64,
}

pub struct BoxGlyph {
    pub x: f64,
    pub width: f64,
    pub center: f64,
    pub color: &'static str,
    pub q1_y: f64,
    pub q3_y: f64,
    pub median_y: f64,
    pub min_y: f64,
    pub max_y: f64,
}

pub struct Category {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

pub struct Panel {
    pub x: f64,
    pub y: f64,
    pub title: String,
    pub title_x: f64,
    pub y_label: String,
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
    pub zero_y: f64,
    pub ticks: Vec<Tick>,
    pub bars: Vec<Bar>,
    pub boxes: Vec<BoxGlyph>,
    pub categories: Vec<Category>,
}

#[derive(Template)]
#[template(path = "chart.svg")]
pub struct ChartTemplate {
    pub title: String,
    pub title_x: f64,
    pub width: f64,
    pub height: f64,
    pub panels: Vec<Panel>,
}

struct Slot {
    x: f64,
    width: f64,
    center: f64,
}

#[allow(clippy::cast_precision_loss)]
fn slots(n: usize, left: f64, right: f64) -> Vec<Slot> {
    let step = (right - left) / n.max(1) as f64;
    (0..n)
        .map(|i| {
            let start = left + step * i as f64;
            Slot {
                x: round1(start + step * 0.2),
                width: round1(step * 0.6),
                center: round1(start + step * 0.5),
            }
        })
        .collect()
}

fn empty_panel(origin: (f64, f64), title: &str, y_label: &str, scale: &Scale) -> Panel {
    let left = MARGIN_LEFT;
    let right = PANEL_W - MARGIN_RIGHT;
    Panel {
        x: origin.0,
        y: origin.1,
        title: title.to_string(),
        title_x: PANEL_W / 2.0,
        y_label: y_label.to_string(),
        left,
        right,
        top: MARGIN_TOP,
        bottom: MARGIN_TOP + (PANEL_H - MARGIN_TOP - MARGIN_BOTTOM),
        zero_y: scale.y(0.0),
        ticks: scale.ticks(left - 6.0),
        bars: Vec::new(),
        boxes: Vec::new(),
        categories: Vec::new(),
    }
}

fn plot_scale(axis: Axis, values: impl IntoIterator<Item = f64>) -> Scale {
    Scale::with_axis(axis, values, MARGIN_TOP, PANEL_H - MARGIN_TOP - MARGIN_BOTTOM)
}

fn categories(summaries: &[SentimentSummary], slots: &[Slot], y: f64) -> Vec<Category> {
    summaries
        .iter()
        .zip(slots)
        .map(|(s, slot)| Category {
            x: slot.center,
            y,
            text: s.classification.clone(),
        })
        .collect()
}

fn bar_panel(
    origin: (f64, f64),
    title: &str,
    y_label: &str,
    summaries: &[SentimentSummary],
    value: fn(&SentimentSummary) -> f64,
    error: Option<fn(&SentimentSummary) -> f64>,
) -> Panel {
    let spread = |s: &SentimentSummary| error.map_or(0.0, |e| e(s));
    let scale = plot_scale(
        Axis::Linear,
        summaries
            .iter()
            .flat_map(|s| [value(s) + spread(s), value(s) - spread(s)]),
    );
    let mut panel = empty_panel(origin, title, y_label, &scale);
    let slots = slots(summaries.len(), panel.left, panel.right);

    panel.bars = summaries
        .iter()
        .zip(&slots)
        .enumerate()
        .map(|(i, (s, slot))| {
            let v = value(s);
            let (top, bottom) = (scale.y(v.max(0.0)), scale.y(v.min(0.0)));
            Bar {
                x: slot.x,
                y: top,
                width: slot.width,
                height: round1(bottom - top),
                center: slot.center,
                color: PALETTE[i % PALETTE.len()],
                value_label: fmt_value(v),
                label_y: round1(top - 4.0),
                has_error: error.is_some(),
                err_top: scale.y(v + spread(s)),
                err_bottom: scale.y(v - spread(s)),
            }
        })
        .collect();
    panel.categories = categories(summaries, &slots, panel.bottom + 16.0);
    panel
}

fn box_panel(origin: (f64, f64), title: &str, summaries: &[SentimentSummary]) -> Panel {
    let scale = plot_scale(
        Axis::SymLog,
        summaries.iter().flat_map(|s| [s.pnl_min, s.pnl_max]),
    );
    let mut panel = empty_panel(origin, title, "Total PnL (symlog)", &scale);
    let slots = slots(summaries.len(), panel.left, panel.right);

    panel.boxes = summaries
        .iter()
        .zip(&slots)
        .enumerate()
        .map(|(i, (s, slot))| BoxGlyph {
            x: slot.x,
            width: slot.width,
            center: slot.center,
            color: PALETTE[i % PALETTE.len()],
            q1_y: scale.y(s.pnl_q1),
            q3_y: scale.y(s.pnl_q3),
            median_y: scale.y(s.pnl_median),
            min_y: scale.y(s.pnl_min),
            max_y: scale.y(s.pnl_max),
        })
        .collect();
    panel.categories = categories(summaries, &slots, panel.bottom + 16.0);
    panel
}

fn chart(title: &str, columns: usize, panels: Vec<Panel>) -> ChartTemplate {
    #[allow(clippy::cast_precision_loss)]
    let rows = panels.len().div_ceil(columns.max(1)) as f64;
    #[allow(clippy::cast_precision_loss)]
    let width = PANEL_W * columns as f64;
    ChartTemplate {
        title: title.to_string(),
        title_x: width / 2.0,
        width,
        height: HEADER_H + PANEL_H * rows,
        panels,
    }
}

fn origin(index: usize, columns: usize) -> (f64, f64) {
    #[allow(clippy::cast_precision_loss)]
    let (col, row) = ((index % columns) as f64, (index / columns) as f64);
    (PANEL_W * col, HEADER_H + PANEL_H * row)
}

pub fn pnl_by_sentiment_chart(summaries: &[SentimentSummary]) -> ChartTemplate {
    let panels = vec![
        box_panel(origin(0, 3), "PnL Distribution by Sentiment", summaries),
        bar_panel(
            origin(1, 3),
            "Average PnL (±95% CI)",
            "Mean daily PnL",
            summaries,
            |s: &SentimentSummary| s.mean_pnl,
            Some(|s: &SentimentSummary| 1.96 * s.sem_pnl),
        ),
        bar_panel(
            origin(2, 3),
            "Average Win Rate by Sentiment",
            "Win Rate (%)",
            summaries,
            |s: &SentimentSummary| s.mean_win_rate,
            None,
        ),
    ];
    chart("PnL vs Market Sentiment", 3, panels)
}

/// Single-panel PnL box plot for the dashboard.
pub fn pnl_box_chart(summaries: &[SentimentSummary]) -> ChartTemplate {
    let panel = box_panel(origin(0, 1), "Total PnL per account-day", summaries);
    chart("PnL Distribution by Sentiment", 1, vec![panel])
}

pub fn behavior_changes_chart(summaries: &[SentimentSummary]) -> ChartTemplate {
    let behaviors: [(&str, &str, fn(&SentimentSummary) -> f64); 4] = [
        ("Trade Frequency", "Trades per account-day", |s: &SentimentSummary| s.mean_trade_count),
        ("Average Leverage", "Leverage (x)", |s: &SentimentSummary| s.mean_leverage),
        ("Average Trade Size", "Size (USD)", |s: &SentimentSummary| s.mean_trade_size),
        ("Long Position %", "Long (%)", |s: &SentimentSummary| s.mean_long_pct),
    ];
    let panels = behaviors
        .iter()
        .enumerate()
        .map(|(i, (title, y_label, value))| {
            bar_panel(origin(i, 2), title, y_label, summaries, *value, None)
        })
        .collect();
    chart("Trader Behavior by Sentiment", 2, panels)
}

#[derive(Template)]
#[template(path = "timeseries.svg")]
pub struct TimeseriesTemplate {
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
    pub pnl_points: String,
    pub sentiment_points: String,
    pub pnl_ticks: Vec<Tick>,
    pub sentiment_ticks: Vec<Tick>,
    pub first_date: String,
    pub last_date: String,
}

/// Cumulative PnL (left axis) against sentiment score (right axis, 0-100).
#[allow(clippy::cast_precision_loss)]
pub fn timeseries_chart(points: &[TimePoint]) -> TimeseriesTemplate {
    let (width, height) = (PANEL_W * 2.0, PANEL_H);
    let (left, right) = (MARGIN_LEFT, width - MARGIN_LEFT);
    let (top, plot_h) = (MARGIN_TOP / 2.0, PANEL_H - MARGIN_TOP / 2.0 - MARGIN_BOTTOM);

    let pnl_scale = Scale::new(points.iter().map(|p| p.cumulative_pnl), top, plot_h);
    let sentiment_scale = Scale {
        axis: Axis::Linear,
        lo: 0.0,
        hi: 100.0,
        top,
        height: plot_h,
    };

    let step = (right - left) / points.len().saturating_sub(1).max(1) as f64;
    let polyline = |y: &dyn Fn(&TimePoint) -> f64| {
        points
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{},{}", round1(left + step * i as f64), y(p)))
            .collect::<Vec<_>>()
            .join(" ")
    };

    TimeseriesTemplate {
        width,
        height,
        left,
        right,
        top,
        bottom: top + plot_h,
        pnl_points: polyline(&|p: &TimePoint| pnl_scale.y(p.cumulative_pnl)),
        sentiment_points: polyline(&|p: &TimePoint| sentiment_scale.y(p.sentiment_score)),
        pnl_ticks: pnl_scale.ticks(left - 6.0),
        sentiment_ticks: sentiment_scale.ticks(right + 6.0),
        first_date: points.first().map(|p| p.date.to_string()).unwrap_or_default(),
        last_date: points.last().map(|p| p.date.to_string()).unwrap_or_default(),
    }
}

/// Render both batch charts into `dir`, returning the written paths.
pub fn write_charts(rows: &[DailyMetricRow], dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create chart dir {}", dir.display()))?;
    let summaries = summarize_by_sentiment(rows);

    let outputs = [
        ("pnl_by_sentiment.svg", pnl_by_sentiment_chart(&summaries).render()?),
        ("behavior_changes.svg", behavior_changes_chart(&summaries).render()?),
    ];

    let mut written = Vec::with_capacity(outputs.len());
    for (name, svg) in outputs {
        let path = dir.join(name);
        std::fs::write(&path, svg)
            .with_context(|| format!("failed to write chart {}", path.display()))?;
        tracing::info!(path = %path.display(), "chart written");
        written.push(path);
    }
    Ok(written)
}
