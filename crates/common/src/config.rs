use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub general: General,
    pub paths: Paths,
    #[serde(default)]
    pub cleaning: Cleaning,
    pub web: Option<Web>,
}

#[derive(Debug, Deserialize)]
pub struct General {
    pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Paths {
    pub sentiment_csv: PathBuf,
    pub trades_csv: PathBuf,
    pub output_dir: PathBuf,
}

impl Paths {
    pub fn final_features(&self) -> PathBuf {
        self.output_dir.join("final_features.csv")
    }

    pub fn cleaned_sentiment(&self) -> PathBuf {
        self.output_dir.join("cleaned_fear_greed.csv")
    }

    pub fn cleaned_trades(&self) -> PathBuf {
        self.output_dir.join("cleaned_trader_data.csv")
    }

    pub fn charts_dir(&self) -> PathBuf {
        self.output_dir.join("charts")
    }

    pub fn segments(&self) -> PathBuf {
        self.output_dir.join("tables").join("trader_segments.csv")
    }

    /// Prometheus text dump written at the end of each batch run.
    pub fn metrics_snapshot(&self) -> PathBuf {
        self.output_dir.join("metrics.prom")
    }
}

/// Fallbacks applied while coercing loosely-typed input columns.
#[derive(Debug, Clone, Deserialize)]
pub struct Cleaning {
    pub default_classification: String,
    pub default_sentiment_score: f64,
    pub default_leverage: f64,
    /// Classification label -> score, used when the sentiment file has no `value` column.
    /// Labels missing from the map take `default_sentiment_score`.
    #[serde(default = "default_score_map")]
    pub score_map: BTreeMap<String, f64>,
}

fn default_score_map() -> BTreeMap<String, f64> {
    [("Fear", 20.0), ("Neutral", 50.0), ("Greed", 80.0)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

impl Default for Cleaning {
    fn default() -> Self {
        Self {
            default_classification: "Neutral".to_string(),
            default_sentiment_score: 50.0,
            default_leverage: 1.0,
            score_map: default_score_map(),
        }
    }
}

impl Cleaning {
    /// Score for a classification label, falling back to the default score for unknown labels.
    pub fn score_for(&self, classification: &str) -> f64 {
        self.score_map
            .get(classification.trim())
            .copied()
            .unwrap_or(self.default_sentiment_score)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Web {
    pub port: u16,
    pub host: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}
