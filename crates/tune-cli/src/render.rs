//! Plain-text rendering of parameters and controller events.

use tune_core::ParamRow;
use tune_sync::{SyncEvent, SyncPhase};

pub fn bounds(row: &ParamRow) -> String {
    let side = |bound: Option<f64>| bound.map_or_else(|| "-".to_string(), |value| value.to_string());
    format!("[{}, {}]", side(row.min), side(row.max))
}

/// Value with at most four decimals and no trailing zeros.
pub fn value(row: &ParamRow) -> String {
    format!("{:.4}", row.value)
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// One line per parameter, columns aligned.
pub fn table(rows: &[ParamRow]) -> Vec<String> {
    let key_width = rows.iter().map(|row| row.key.len()).max().unwrap_or(0);
    let label_width = rows.iter().map(|row| row.label.len()).max().unwrap_or(0);
    rows.iter()
        .map(|row| {
            format!(
                "{:key_width$}  {:label_width$}  {:11}  {:14}  {}",
                row.key,
                row.label,
                row.widget.as_str(),
                bounds(row),
                value(row),
            )
        })
        .collect()
}

pub fn phase(phase: SyncPhase) -> String {
    match phase {
        SyncPhase::Idle => "idle".to_string(),
        SyncPhase::Committing => "committing".to_string(),
        SyncPhase::AwaitingArtifact(version) => format!("awaiting artifact v{version}"),
    }
}

pub fn event(event: &SyncEvent) -> String {
    match event {
        SyncEvent::PhaseChanged(next) => format!("phase: {}", phase(*next)),
        SyncEvent::ParametersLoaded { count } => format!("loaded {count} parameter(s)"),
        SyncEvent::ValidationChanged { key, error: Some(error) } => {
            format!("invalid {key}: {error}")
        }
        SyncEvent::ValidationChanged { key, error: None } => format!("{key} is valid again"),
        SyncEvent::Committed { keys, version } => {
            let keys = keys.iter().map(|key| key.as_str()).collect::<Vec<_>>().join(", ");
            format!("committed {keys} (v{version})")
        }
        SyncEvent::ArtifactDisplayed { version } => format!("artifact v{version} displayed"),
        SyncEvent::ArtifactDiscarded { version, current } => {
            format!("artifact v{version} discarded (current is v{current})")
        }
        SyncEvent::PushReceived { version } => format!("remote update to v{version}"),
        SyncEvent::LiveUpdatesClosed { reason } => format!("live updates closed: {reason}"),
        SyncEvent::Error(err) => format!("error: {err}"),
    }
}
