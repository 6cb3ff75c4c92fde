use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::Path;

pub fn describe() {
    describe_counter!(
        "pipeline_rows_loaded_total",
        "Raw CSV rows loaded, labelled by dataset."
    );
    describe_counter!(
        "pipeline_unparsed_dates_total",
        "Rows whose date/timestamp could not be parsed, labelled by dataset."
    );
    describe_counter!(
        "pipeline_daily_rows_total",
        "Daily (date, account) metric rows produced by aggregation."
    );
    describe_gauge!(
        "pipeline_merged_rows",
        "Rows in the last merged features table."
    );
    describe_histogram!(
        "pipeline_stage_duration_ms",
        "Wall time of each pipeline stage in milliseconds."
    );
}

/// Install the global Prometheus recorder for a batch run. The returned handle renders
/// everything recorded so far.
pub fn install_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;
    describe();
    Ok(handle)
}

/// Write the Prometheus text exposition of `handle` to `path`.
pub fn write_snapshot(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    handle.run_upkeep();
    std::fs::write(path, handle.render())
        .with_context(|| format!("failed to write metrics snapshot {}", path.display()))
}
