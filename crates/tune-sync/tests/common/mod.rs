#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tune_sync::{
    Gateway, Metadata, ParamKey, ParamMeta, ParameterSet, SyncError, SyncEvent, SyncHandle,
    SyncOptions, SyncStatus, WidgetKind,
};

/// In-memory backend with scripted latencies and failures.
///
/// Like the real backend, a write that changes a value bumps the version.
/// Versions pushed with [`MockGateway::script_versions`] are returned by
/// `fetch_version` first, in order.
#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    metadata: Metadata,
    version: u64,
    scripted_versions: VecDeque<u64>,
    failing_keys: HashSet<String>,
    fail_metadata: bool,
    writes: Vec<(String, f64)>,
    metadata_fetches: usize,
    artifact_fetches: Vec<u64>,
    metadata_delay: Duration,
    version_delay: Duration,
    write_delay: Duration,
    artifact_delay: Duration,
    artifact_delays: HashMap<u64, Duration>,
}

impl MockGateway {
    pub fn new(metadata: Metadata, version: u64) -> Arc<Self> {
        let gateway = Self::default();
        {
            let mut state = gateway.state.lock();
            state.metadata = metadata;
            state.version = version;
        }
        Arc::new(gateway)
    }

    pub fn script_versions(&self, versions: impl IntoIterator<Item = u64>) {
        self.state.lock().scripted_versions.extend(versions);
    }

    pub fn fail_key(&self, key: &str) {
        self.state.lock().failing_keys.insert(key.to_string());
    }

    pub fn set_fail_metadata(&self, fail: bool) {
        self.state.lock().fail_metadata = fail;
    }

    pub fn set_metadata_delay(&self, delay: Duration) {
        self.state.lock().metadata_delay = delay;
    }

    pub fn set_version_delay(&self, delay: Duration) {
        self.state.lock().version_delay = delay;
    }

    pub fn set_write_delay(&self, delay: Duration) {
        self.state.lock().write_delay = delay;
    }

    pub fn set_artifact_delay(&self, delay: Duration) {
        self.state.lock().artifact_delay = delay;
    }

    pub fn set_artifact_delay_for(&self, version: u64, delay: Duration) {
        self.state.lock().artifact_delays.insert(version, delay);
    }

    /// Change a value on the server side, as another client would.
    pub fn set_remote_value(&self, key: &str, value: f64) {
        let mut state = self.state.lock();
        state.metadata.values.insert(key, value);
        state.version += 1;
    }

    /// Change the declared bounds of `key`, as a backend redeploy would.
    pub fn set_remote_bounds(&self, key: &str, min: Option<f64>, max: Option<f64>) {
        let mut state = self.state.lock();
        if let Some(meta) = state.metadata.params.get_mut(key) {
            meta.min = min;
            meta.max = max;
        }
        state.version += 1;
    }

    pub fn writes(&self) -> Vec<(String, f64)> {
        self.state.lock().writes.clone()
    }

    pub fn metadata_fetches(&self) -> usize {
        self.state.lock().metadata_fetches
    }

    pub fn artifact_fetches(&self) -> Vec<u64> {
        self.state.lock().artifact_fetches.clone()
    }

    pub fn remote_value(&self, key: &str) -> Option<f64> {
        self.state.lock().metadata.values.get(key)
    }
}

impl Gateway for MockGateway {
    async fn fetch_metadata(&self) -> Result<Metadata, SyncError> {
        let delay = self.state.lock().metadata_delay;
        tokio::time::sleep(delay).await;
        let mut state = self.state.lock();
        state.metadata_fetches += 1;
        if state.fail_metadata {
            return Err(SyncError::transport(
                "fetch metadata",
                Some(500),
                "backend unavailable",
            ));
        }
        Ok(state.metadata.clone())
    }

    async fn fetch_version(&self) -> Result<u64, SyncError> {
        let delay = self.state.lock().version_delay;
        tokio::time::sleep(delay).await;
        let mut state = self.state.lock();
        let version = state.version;
        Ok(state.scripted_versions.pop_front().unwrap_or(version))
    }

    async fn fetch_artifact(&self, version: u64) -> Result<Arc<[u8]>, SyncError> {
        let delay = {
            let state = self.state.lock();
            state
                .artifact_delays
                .get(&version)
                .copied()
                .unwrap_or(state.artifact_delay)
        };
        tokio::time::sleep(delay).await;
        self.state.lock().artifact_fetches.push(version);
        Ok(artifact_bytes(version))
    }

    async fn write_parameter(&self, key: &str, value: f64) -> Result<(), SyncError> {
        let delay = self.state.lock().write_delay;
        tokio::time::sleep(delay).await;
        let mut state = self.state.lock();
        state.writes.push((key.to_string(), value));
        if state.failing_keys.contains(key) {
            return Err(SyncError::transport(
                format!("write '{key}'"),
                Some(400),
                "Validation failed",
            ));
        }
        if !state.metadata.params.contains_key(key) {
            return Err(SyncError::transport(
                format!("write '{key}'"),
                Some(404),
                format!("Parameter {key} does not exist"),
            ));
        }
        let changed = state
            .metadata
            .values
            .get(key)
            .is_none_or(|current| current != value);
        if changed {
            state.metadata.values.insert(key, value);
            state.version += 1;
        }
        Ok(())
    }
}

pub fn artifact_bytes(version: u64) -> Arc<[u8]> {
    Arc::from(format!("artifact-v{version}").into_bytes())
}

/// Metadata with bounded int sliders named by `entries`.
pub fn metadata(entries: &[(&str, f64)]) -> Metadata {
    Metadata::from_entries(
        entries.iter().map(|(key, value)| {
            (
                ParamKey::from(*key),
                ParamMeta::new(WidgetKind::IntSlider, Some(0.0), Some(100.0)),
                *value,
            )
        }),
        None,
    )
}

pub fn set(entries: &[(&str, f64)]) -> ParameterSet {
    entries.iter().map(|(key, value)| (*key, *value)).collect()
}

pub fn options() -> SyncOptions {
    SyncOptions {
        debounce: Duration::from_millis(500),
        live_updates: false,
        ..SyncOptions::default()
    }
}

/// Wait until no round is running and the status satisfies `ready`.
pub async fn settle(
    handle: &mut SyncHandle,
    mut ready: impl FnMut(&SyncStatus) -> bool,
) -> SyncStatus {
    tokio::time::timeout(
        Duration::from_secs(60),
        handle.wait_until(|status| status.is_settled() && ready(status)),
    )
    .await
    .expect("controller did not settle in time")
    .expect("controller stopped")
}

/// Drain every event published so far.
pub fn drain_events(handle: &mut SyncHandle) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Some(event) = handle.try_next_event() {
        events.push(event);
    }
    events
}

/// Wait for the first event matching `wanted`, skipping others.
pub async fn wait_event(
    handle: &mut SyncHandle,
    mut wanted: impl FnMut(&SyncEvent) -> bool,
) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            match handle.next_event().await {
                Some(event) if wanted(&event) => return event,
                Some(_) => {}
                None => panic!("controller stopped"),
            }
        }
    })
    .await
    .expect("event did not arrive in time")
}
