//! CLI definitions for tune.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tune_core::ParamKey;

#[derive(Debug, Parser)]
#[command(
    name = "tune",
    version,
    about = "Edit remote rendering parameters and follow the rendered artifact",
    after_help = "Examples:\n  tune params\n  tune set inline=18 aperture=2.5\n  tune watch --output result.png\n  tune --url http://render.local:8000 fetch --output result.png"
)]
pub struct Cli {
    /// Configuration file (defaults to ./tune.toml when present).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
    /// Backend base URL (overrides server.base_url).
    #[arg(long, global = true)]
    pub url: Option<String>,
    /// Log debug details to stderr.
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List parameters with their bounds and current values.
    Params,
    /// Follow parameters and artifacts; type `key=value` lines to edit.
    #[command(after_help = "Examples:\n  tune watch\n  tune watch --output result.png --no-live")]
    Watch {
        /// Write every displayed artifact to this file.
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Do not subscribe to live updates.
        #[arg(long)]
        no_live: bool,
    },
    /// Commit one or more values and wait for the new artifact.
    Set {
        /// Assignments in `key=value` form.
        #[arg(required = true, value_parser = parse_assignment)]
        assignments: Vec<Assignment>,
        /// Write the resulting artifact to this file.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Download the artifact of a version (latest by default).
    Fetch {
        /// Artifact version; the current version when omitted.
        #[arg(long)]
        version: Option<u64>,
        /// Destination file.
        #[arg(long, short)]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub key: ParamKey,
    pub value: f64,
}

pub fn parse_assignment(text: &str) -> Result<Assignment, String> {
    let (key, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{text}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing parameter name in '{text}'"));
    }
    let value = value.trim();
    let value: f64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if !value.is_finite() {
        return Err(format!("'{text}' is not a finite number"));
    }
    Ok(Assignment {
        key: key.into(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn assignments_parse() {
        assert_eq!(
            parse_assignment(" inline = 18 "),
            Ok(Assignment {
                key: "inline".into(),
                value: 18.0
            })
        );
        assert_eq!(
            parse_assignment("aperture=-2.5e1").map(|a| a.value),
            Ok(-25.0)
        );
    }

    #[test]
    fn malformed_assignments_are_rejected() {
        assert_eq!(
            parse_assignment("inline"),
            Err("expected key=value, got 'inline'".to_string())
        );
        assert_eq!(
            parse_assignment("=3"),
            Err("missing parameter name in '=3'".to_string())
        );
        assert_eq!(
            parse_assignment("inline=abc"),
            Err("'abc' is not a number".to_string())
        );
        assert!(parse_assignment("inline=NaN").is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tune", "set", "a=1", "b=2", "--url", "http://x:1", "-v"])
            .expect("parse");
        assert!(cli.verbose);
        assert_eq!(cli.url.as_deref(), Some("http://x:1"));
        let Command::Set { assignments, .. } = cli.command else {
            panic!("expected set");
        };
        assert_eq!(assignments.len(), 2);
    }
}
