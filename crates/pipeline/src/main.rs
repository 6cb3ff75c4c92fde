use anyhow::Result;
use pipeline::cli;

fn main() -> Result<()> {
    let invocation = cli::parse_args(std::env::args()).map_err(anyhow::Error::msg)?;
    let config = common::config::Config::load_from(&invocation.config_path)?;

    common::observability::init("pipeline", &config.general.log_level)?;
    let prometheus = pipeline::metrics::install_recorder()?;

    tracing::info!(command = ?invocation.command, "pipeline starting");
    if let Err(e) = cli::run_command(&config, invocation.command) {
        tracing::error!(error = %e, "pipeline failed");
        return Err(e);
    }

    let snapshot = config.paths.metrics_snapshot();
    pipeline::metrics::write_snapshot(&prometheus, &snapshot)?;
    tracing::info!(path = %snapshot.display(), "metrics snapshot written");
    Ok(())
}
