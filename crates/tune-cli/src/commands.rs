//! Command implementations.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tune_core::{validate, Artifact, ParamMeta, ParameterSet, ParameterStore, SyncError};
use tune_sync::{Gateway, HttpGateway, SyncConfig, SyncEvent, SyncHandle, SyncSession};

use crate::cli::{parse_assignment, Assignment};
use crate::render;
use crate::style;

pub async fn params(config: &SyncConfig) -> anyhow::Result<()> {
    let gateway = HttpGateway::new(&config.server)?;
    let metadata = gateway.fetch_metadata().await?;
    let version = gateway.fetch_version().await?;
    let mut store = ParameterStore::new();
    store.replace_all(metadata);
    let rows = store.view();
    if rows.is_empty() {
        println!("{}", style::warn("backend declares no parameters"));
        return Ok(());
    }
    for line in render::table(&rows) {
        println!("{line}");
    }
    println!(
        "{}",
        style::dim(format!("{} parameter(s), version {version}", rows.len()))
    );
    Ok(())
}

pub async fn fetch(config: &SyncConfig, version: Option<u64>, output: &Path) -> anyhow::Result<()> {
    let gateway = HttpGateway::new(&config.server)?;
    let version = match version {
        Some(version) => version,
        None => gateway.fetch_version().await?,
    };
    let bytes = gateway.fetch_artifact(version).await?;
    let artifact = Artifact::new(version, bytes);
    save_artifact(&artifact, output)?;
    println!(
        "{}",
        style::ok(format!(
            "saved artifact v{version} ({} bytes) to {}",
            artifact.len(),
            output.display()
        ))
    );
    Ok(())
}

pub async fn set(
    config: &SyncConfig,
    assignments: Vec<Assignment>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = config.clone();
    config.sync.live_updates = false;
    let mut session = SyncSession::connect(&config).await?;
    let result = commit_assignments(session.handle_mut(), &assignments, output.as_deref()).await;
    session.teardown().await;
    result
}

async fn commit_assignments(
    handle: &mut SyncHandle,
    assignments: &[Assignment],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    wait_loaded(handle).await?;
    let status = handle.status();
    let mut changed = false;
    for Assignment { key, value } in assignments {
        let Some(row) = status.rows.iter().find(|row| row.key == *key) else {
            bail!("unknown parameter '{key}'");
        };
        let meta = ParamMeta::new(row.widget, row.min, row.max);
        if let Some(err) = validate(key, *value, Some(&meta)) {
            return Err(SyncError::Validation(err).into());
        }
        changed |= !ParameterSet::same_value(row.value, *value);
    }
    if !changed {
        println!("{}", style::dim("values already current, nothing to commit"));
        return Ok(());
    }
    for Assignment { key, value } in assignments {
        handle.edit(key.clone(), *value);
    }
    loop {
        match handle.next_event().await {
            Some(event @ SyncEvent::Committed { .. }) => {
                println!("{}", style::ok(render::event(&event)));
                break;
            }
            Some(SyncEvent::Error(err)) => return Err(err.into()),
            Some(event) => debug!("{}", render::event(&event)),
            None => bail!("synchronization stopped before the commit finished"),
        }
    }
    if let (Some(path), Some(artifact)) = (output, handle.artifact()) {
        save_artifact(&artifact, path)?;
        println!(
            "{}",
            style::dim(format!("saved artifact v{} to {}", artifact.version(), path.display()))
        );
    }
    Ok(())
}

pub async fn watch(config: &SyncConfig, output: Option<PathBuf>) -> anyhow::Result<()> {
    let mut session = SyncSession::connect(config).await?;
    if !session.is_listening() && config.sync.live_updates {
        println!("{}", style::warn("live updates unavailable, showing local changes only"));
    }
    println!("{}", style::dim("type key=value to edit, Ctrl-C to quit"));
    let result = follow(session.handle_mut(), output.as_deref()).await;
    session.teardown().await;
    result
}

async fn follow(handle: &mut SyncHandle, output: Option<&Path>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => match parse_assignment(&line) {
                    Ok(Assignment { key, value }) => {
                        handle.edit(key, value);
                    }
                    Err(message) => println!("{}", style::warn(message)),
                },
                None => stdin_open = false,
            },
            event = handle.next_event() => {
                let Some(event) = event else {
                    bail!("synchronization stopped");
                };
                print_event(&event);
                match event {
                    SyncEvent::ParametersLoaded { .. } => {
                        for line in render::table(&handle.status().rows) {
                            println!("  {}", style::key(line));
                        }
                    }
                    SyncEvent::ArtifactDisplayed { .. } => {
                        if let (Some(path), Some(artifact)) = (output, handle.artifact()) {
                            save_artifact(&artifact, path)?;
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

fn print_event(event: &SyncEvent) {
    let line = render::event(event);
    match event {
        SyncEvent::Error(_) | SyncEvent::LiveUpdatesClosed { .. } => {
            println!("{}", style::error(line));
        }
        SyncEvent::ValidationChanged { error: Some(_), .. } | SyncEvent::ArtifactDiscarded { .. } => {
            println!("{}", style::warn(line));
        }
        SyncEvent::Committed { .. } | SyncEvent::ArtifactDisplayed { .. } => {
            println!("{}", style::ok(line));
        }
        _ => println!("{}", style::dim(line)),
    }
}

/// Wait for the startup sequence; a load error aborts.
async fn wait_loaded(handle: &mut SyncHandle) -> anyhow::Result<()> {
    let mut status = handle.status_receiver();
    loop {
        tokio::select! {
            ready = status.wait_for(|status| status.metadata_loaded && status.is_settled()) => {
                ready.context("synchronization stopped during startup")?;
                return Ok(());
            }
            event = handle.next_event() => match event {
                Some(SyncEvent::Error(err)) => return Err(err.into()),
                Some(event) => debug!("{}", render::event(&event)),
                None => bail!("synchronization stopped during startup"),
            },
        }
    }
}

fn save_artifact(artifact: &Artifact, path: &Path) -> anyhow::Result<()> {
    std::fs::write(path, artifact.bytes())
        .with_context(|| format!("failed to write {}", path.display()))
}
