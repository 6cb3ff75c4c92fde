use anyhow::Result;
use common::config::{Config, DEFAULT_CONFIG_PATH};
use std::path::PathBuf;

use crate::jobs;

pub const USAGE: &str = "usage: pipeline [run|clean|segments|charts|all] [--config <path>]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Run,
    Clean,
    Segments,
    Charts,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    pub config_path: PathBuf,
}

pub fn parse_args<I>(mut args: I) -> std::result::Result<Invocation, String>
where
    I: Iterator<Item = String>,
{
    // Drop argv[0].
    let _ = args.next();

    let mut command = None;
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| format!("--config needs a path\n{USAGE}"))?;
                config_path = PathBuf::from(path);
            }
            _ if command.is_some() => return Err(format!("unexpected argument: {arg}\n{USAGE}")),
            "run" => command = Some(Command::Run),
            "clean" => command = Some(Command::Clean),
            "segments" => command = Some(Command::Segments),
            "charts" => command = Some(Command::Charts),
            "all" => command = Some(Command::All),
            other => return Err(format!("unknown command: {other}\n{USAGE}")),
        }
    }

    Ok(Invocation {
        command: command.unwrap_or(Command::Run),
        config_path,
    })
}

pub fn run_command(cfg: &Config, cmd: Command) -> Result<()> {
    match cmd {
        Command::Run => {
            let path = jobs::run_features_job(cfg)?;
            println!("Final features saved to {}", path.display());
        }
        Command::Clean => {
            let (sentiment, trades) = jobs::run_clean_job(cfg)?;
            println!("Cleaned sentiment saved to {}", sentiment.display());
            println!("Cleaned trades saved to {}", trades.display());
        }
        Command::Segments => {
            let path = jobs::run_segments_job(cfg)?;
            println!("Trader segments saved to {}", path.display());
        }
        Command::Charts => {
            for path in jobs::run_charts_job(cfg)? {
                println!("Chart saved to {}", path.display());
            }
        }
        Command::All => {
            for cmd in [Command::Run, Command::Segments, Command::Charts] {
                run_command(cfg, cmd)?;
            }
        }
    }
    Ok(())
}
