use anyhow::Result;
use metrics::describe_gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn describe() {
    describe_gauge!(
        "dashboard_build_info",
        "Build info for the sentiment dashboard (value is always 1)."
    );
    describe_gauge!(
        "dashboard_rows_available",
        "Rows in the merged features table served by the dashboard."
    );
    pipeline::metrics::describe();
}

/// Install a global Prometheus recorder exactly once and return a handle for rendering `/metrics`.
///
/// Upkeep runs on each `/metrics` request.
pub fn init_global() -> Result<PrometheusHandle> {
    if let Some(handle) = PROM_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    ::metrics::gauge!("dashboard_build_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    Ok(PROM_HANDLE.get_or_init(|| handle).clone())
}
