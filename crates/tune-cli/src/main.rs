//! CLI entrypoint for tune.

mod cli;
mod commands;
mod render;
mod style;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tune_sync::config::parse_base_url;
use tune_sync::SyncConfig;

use cli::{Cli, Command};

const DEFAULT_CONFIG_FILE: &str = "tune.toml";

fn main() {
    if let Err(err) = run() {
        eprintln!("{}", style::error(format!("Error: {}", with_tip(&err))));
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(url) = &cli.url {
        config.server.base_url = parse_base_url(url)?;
    }
    init_logging(&config, cli.verbose);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(async {
        match cli.command {
            Command::Params => commands::params(&config).await,
            Command::Watch { output, no_live } => {
                if no_live {
                    config.sync.live_updates = false;
                }
                commands::watch(&config, output).await
            }
            Command::Set {
                assignments,
                output,
            } => commands::set(&config, assignments, output).await,
            Command::Fetch { version, output } => commands::fetch(&config, version, &output).await,
        }
    })
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SyncConfig> {
    match path {
        Some(path) => Ok(SyncConfig::load(path)?),
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            Ok(SyncConfig::load(DEFAULT_CONFIG_FILE)?)
        }
        None => Ok(SyncConfig::default()),
    }
}

fn init_logging(config: &SyncConfig, verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        config.log_level.parse().unwrap_or(tracing::Level::INFO)
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn with_tip(err: &anyhow::Error) -> String {
    let message = format!("{err:#}");
    let tip = if message.contains("invalid config") {
        Some("Tip: check tune.toml (see `tune --help` for the available sections).")
    } else if message.contains("Connection refused") || message.contains("error sending request")
    {
        Some("Tip: is the backend running? Point tune at it with --url or server.base_url.")
    } else {
        None
    };
    match tip {
        Some(tip) => format!("{message}\n{tip}"),
        None => message,
    }
}
