//! Synchronization controller.
//!
//! One task owns the store, the validation state, the version tracker and the
//! committed snapshot. It multiplexes three sources in a single `select!`
//! loop: inputs (user edits, push notices, lifecycle), the debouncer timer and
//! the completions of in-flight gateway calls. Gateway calls run concurrently
//! but every completion is applied here, one at a time.
//!
//! A local *round* is either the initial load (metadata, version, artifact) or
//! a commit (writes, version, artifact). Only one round runs at a time;
//! stabilizations that arrive meanwhile are deferred until it ends. Push
//! notices never wait for a round and never cancel one.

use std::future::Future;
use std::mem;
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture};
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use smol_str::SmolStr;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use tune_core::{
    Artifact, ArtifactSlot, Debouncer, Metadata, ParamKey, ParamRow, ParameterSet,
    ParameterStore, SyncError, ValidationError, ValidationErrors, VersionTracker,
};

use crate::config::{SyncOptions, WriteMode};
use crate::gateway::Gateway;

/// Everything the controller reacts to, besides its own completions.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncInput {
    /// The user changed a value.
    Edit {
        /// Edited parameter.
        key: ParamKey,
        /// New local value, not yet validated.
        value: f64,
    },
    /// The backend announced a new version.
    Push {
        /// Version named by the notice.
        version: u64,
    },
    /// The push stream ended.
    LiveUpdatesClosed {
        /// Transport error text, or "stream ended".
        reason: SmolStr,
    },
    /// Re-run the startup sequence.
    Reload,
    /// Stop the controller and release its state.
    Shutdown,
}

/// Phase of the current local round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    /// No commit is running.
    #[default]
    Idle,
    /// Waiting for the artifact of the given version.
    AwaitingArtifact(u64),
    /// Writes or the follow-up version fetch are in flight.
    Committing,
}

/// Notifications published by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The phase moved to the given one.
    PhaseChanged(SyncPhase),
    /// Metadata was (re)loaded.
    ParametersLoaded {
        /// Number of declared parameters.
        count: usize,
    },
    /// The validation outcome of a key changed.
    ValidationChanged {
        /// Affected parameter.
        key: ParamKey,
        /// New error, `None` once the value is valid again.
        error: Option<ValidationError>,
    },
    /// A commit round whose writes and version fetch succeeded has ended.
    Committed {
        /// Keys written in the round.
        keys: Vec<ParamKey>,
        /// Version reported after the writes.
        version: u64,
    },
    /// An artifact replaced the displayed one.
    ArtifactDisplayed {
        /// Its version.
        version: u64,
    },
    /// A fetched artifact was stale by the time it arrived.
    ArtifactDiscarded {
        /// Version of the dropped artifact.
        version: u64,
        /// Version adopted meanwhile.
        current: u64,
    },
    /// A push notice arrived.
    PushReceived {
        /// Version named by the notice.
        version: u64,
    },
    /// The push stream ended; no reconnect is attempted.
    LiveUpdatesClosed {
        /// Transport error text, or "stream ended".
        reason: SmolStr,
    },
    /// A gateway call or a commit failed.
    Error(SyncError),
}

/// Observable controller state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStatus {
    /// Phase of the current local round.
    pub phase: SyncPhase,
    /// Version currently adopted by the tracker.
    pub current_version: u64,
    /// Version of the artifact on display.
    pub displayed_version: Option<u64>,
    /// Last parameter set known to be committed on the remote.
    pub snapshot: ParameterSet,
    /// Local values, including uncommitted edits.
    pub values: ParameterSet,
    /// Display rows in order.
    pub rows: Vec<ParamRow>,
    /// Current validation errors.
    pub validation: Vec<ValidationError>,
    /// Metadata has been loaded at least once.
    pub metadata_loaded: bool,
    /// The startup sequence is running.
    pub loading: bool,
}

impl SyncStatus {
    /// No round is running.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.phase == SyncPhase::Idle && !self.loading
    }
}

/// Client side of a running controller.
#[derive(Debug)]
pub struct SyncHandle {
    inputs: mpsc::UnboundedSender<SyncInput>,
    events: mpsc::UnboundedReceiver<SyncEvent>,
    status: watch::Receiver<SyncStatus>,
    artifact: watch::Receiver<Option<Artifact>>,
}

impl SyncHandle {
    /// Returns `false` once the controller has stopped.
    pub fn edit(&self, key: impl Into<ParamKey>, value: f64) -> bool {
        self.send(SyncInput::Edit {
            key: key.into(),
            value,
        })
    }

    /// Ask for the startup sequence to run again.
    pub fn reload(&self) -> bool {
        self.send(SyncInput::Reload)
    }

    /// Ask the controller to stop.
    pub fn shutdown(&self) -> bool {
        self.send(SyncInput::Shutdown)
    }

    /// Queue any input; `false` once the controller has stopped.
    pub fn send(&self, input: SyncInput) -> bool {
        self.inputs.send(input).is_ok()
    }

    /// Sender for other producers such as the live-update listener.
    #[must_use]
    pub fn inputs(&self) -> mpsc::UnboundedSender<SyncInput> {
        self.inputs.clone()
    }

    /// Next published event; `None` after the controller stopped and the
    /// queue is drained.
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        self.events.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_next_event(&mut self) -> Option<SyncEvent> {
        self.events.try_recv().ok()
    }

    /// Latest published status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Wait until the published status satisfies `ready`.
    ///
    /// Returns `None` if the controller stops first.
    pub async fn wait_until(
        &mut self,
        ready: impl FnMut(&SyncStatus) -> bool,
    ) -> Option<SyncStatus> {
        self.status.wait_for(ready).await.ok().map(|status| status.clone())
    }

    /// Observe every status change.
    #[must_use]
    pub fn status_receiver(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    /// The artifact on display.
    #[must_use]
    pub fn artifact(&self) -> Option<Artifact> {
        self.artifact.borrow().clone()
    }

    /// Observe the displayed artifact.
    #[must_use]
    pub fn artifact_receiver(&self) -> watch::Receiver<Option<Artifact>> {
        self.artifact.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Load,
    Commit,
    Push,
}

enum Completion {
    Metadata {
        pushed: Option<u64>,
        result: Result<Metadata, SyncError>,
    },
    Written {
        results: Vec<(ParamKey, Result<(), SyncError>)>,
    },
    Version {
        origin: Origin,
        result: Result<u64, SyncError>,
    },
    Artifact {
        origin: Origin,
        version: u64,
        result: Result<Arc<[u8]>, SyncError>,
    },
}

#[derive(Debug)]
struct CommitRound {
    set: ParameterSet,
    keys: Vec<ParamKey>,
    /// Version reported after every write landed.
    version: Option<u64>,
}

#[derive(Debug)]
enum Round {
    Load,
    Commit(CommitRound),
}

/// Owner of all synchronization state; see the module docs.
///
/// Create one with [`SyncController::new`] and drive it with
/// [`SyncController::run`] on a task.
pub struct SyncController<G: Gateway> {
    gateway: Arc<G>,
    options: SyncOptions,
    store: ParameterStore,
    validation: ValidationErrors,
    tracker: VersionTracker,
    snapshot: ParameterSet,
    debouncer: Debouncer<ParameterSet>,
    phase: SyncPhase,
    round: Option<Round>,
    deferred: bool,
    reload_requested: bool,
    inflight: FuturesUnordered<BoxFuture<'static, Completion>>,
    inbox: mpsc::UnboundedReceiver<SyncInput>,
    events: mpsc::UnboundedSender<SyncEvent>,
    status: watch::Sender<SyncStatus>,
    slot: ArtifactSlot,
}

impl<G: Gateway> SyncController<G> {
    /// A controller over `gateway` and the handle that talks to it.
    pub fn new(gateway: Arc<G>, options: SyncOptions) -> (Self, SyncHandle) {
        let (inputs, inbox) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();
        let (status, status_rx) = watch::channel(SyncStatus::default());
        let slot = ArtifactSlot::new();
        let handle = SyncHandle {
            inputs,
            events: event_rx,
            status: status_rx,
            artifact: slot.subscribe(),
        };
        let controller = Self {
            gateway,
            options,
            store: ParameterStore::new(),
            validation: ValidationErrors::new(),
            tracker: VersionTracker::new(options.version_policy),
            snapshot: ParameterSet::new(),
            debouncer: Debouncer::new(options.debounce),
            phase: SyncPhase::Idle,
            round: None,
            deferred: false,
            reload_requested: false,
            inflight: FuturesUnordered::new(),
            inbox,
            events,
            status,
            slot,
        };
        (controller, handle)
    }

    /// Run the startup sequence, then react to inputs until shut down.
    pub async fn run(mut self) {
        self.start_load();
        self.publish();
        loop {
            tokio::select! {
                biased;
                input = self.inbox.recv() => match input {
                    Some(SyncInput::Shutdown) | None => break,
                    Some(input) => self.on_input(input),
                },
                Some(done) = self.inflight.next(), if !self.inflight.is_empty() => {
                    self.on_completion(done);
                }
                set = self.debouncer.stabilized(), if self.debouncer.is_pending() => {
                    self.on_stabilized(set);
                }
            }
            self.publish();
        }
        self.teardown();
    }

    fn on_input(&mut self, input: SyncInput) {
        match input {
            SyncInput::Edit { key, value } => self.on_edit(key, value),
            SyncInput::Push { version } => self.on_push(version),
            SyncInput::LiveUpdatesClosed { reason } => {
                warn!("live updates closed: {reason}");
                self.emit(SyncEvent::LiveUpdatesClosed { reason });
            }
            SyncInput::Reload => {
                if self.round.is_some() {
                    debug!("reload requested during a round, queued");
                    self.reload_requested = true;
                } else {
                    self.start_load();
                }
            }
            SyncInput::Shutdown => {}
        }
    }

    fn on_edit(&mut self, key: ParamKey, value: f64) {
        if !self.store.set(key.clone(), value) {
            return;
        }
        if self.validation.revalidate(&self.store, &key) {
            let error = self.validation.get(&key).cloned();
            self.emit(SyncEvent::ValidationChanged { key, error });
        }
        self.debouncer.push(self.store.get().clone());
    }

    fn on_push(&mut self, version: u64) {
        info!("live update: version {version}");
        self.emit(SyncEvent::PushReceived { version });
        let gateway = Arc::clone(&self.gateway);
        self.spawn(async move {
            Completion::Metadata {
                pushed: Some(version),
                result: gateway.fetch_metadata().await,
            }
        });
    }

    fn on_stabilized(&mut self, set: ParameterSet) {
        if self.round.is_some() || !self.store.is_loaded() {
            debug!("stabilized while busy, deferring");
            self.deferred = true;
            return;
        }
        let set = set.restricted_to(|key| self.store.meta(key).is_some());
        if set.is_empty() {
            return;
        }
        if self.validation.has_errors() {
            debug!("commit blocked by {} validation error(s)", self.validation.len());
            return;
        }
        let changed = set.changed_keys(&self.snapshot);
        if changed.is_empty() {
            debug!("stabilized values match the committed snapshot");
            return;
        }
        let keys = match self.options.write_mode {
            WriteMode::Changed => changed,
            WriteMode::All => set.keys().cloned().collect(),
        };
        self.begin_commit(set, keys);
    }

    fn begin_commit(&mut self, set: ParameterSet, keys: Vec<ParamKey>) {
        info!("committing {} parameter(s)", keys.len());
        let writes: Vec<_> = keys
            .iter()
            .filter_map(|key| {
                let value = set.get(key)?;
                let gateway = Arc::clone(&self.gateway);
                let key = key.clone();
                Some(async move {
                    let result = gateway.write_parameter(&key, value).await;
                    (key, result)
                })
            })
            .collect();
        self.round = Some(Round::Commit(CommitRound {
            set,
            keys,
            version: None,
        }));
        self.set_phase(SyncPhase::Committing);
        self.spawn(async move {
            Completion::Written {
                results: join_all(writes).await,
            }
        });
    }

    fn start_load(&mut self) {
        info!("loading parameters");
        self.round = Some(Round::Load);
        let gateway = Arc::clone(&self.gateway);
        self.spawn(async move {
            Completion::Metadata {
                pushed: None,
                result: gateway.fetch_metadata().await,
            }
        });
    }

    fn on_completion(&mut self, done: Completion) {
        match done {
            Completion::Metadata { pushed, result } => self.on_metadata(pushed, result),
            Completion::Written { results } => self.on_written(results),
            Completion::Version { origin, result } => match result {
                Ok(version) => {
                    if let Some(Round::Commit(round)) = &mut self.round {
                        round.version = Some(version);
                    }
                    self.adopt_and_fetch(origin, version);
                }
                Err(err) => {
                    self.report(err);
                    self.end_round();
                }
            },
            Completion::Artifact {
                origin,
                version,
                result,
            } => {
                match result {
                    Ok(bytes) => self.display(version, bytes),
                    Err(err) => self.report(err),
                }
                if origin != Origin::Push {
                    self.end_round();
                }
            }
        }
    }

    fn on_metadata(&mut self, pushed: Option<u64>, result: Result<Metadata, SyncError>) {
        match result {
            Ok(metadata) => self.apply_metadata(metadata),
            Err(err) => {
                self.report(err);
                if pushed.is_none() {
                    self.end_round();
                    return;
                }
            }
        }
        match pushed {
            Some(version) => self.adopt_and_fetch(Origin::Push, version),
            None => {
                let gateway = Arc::clone(&self.gateway);
                self.spawn(async move {
                    Completion::Version {
                        origin: Origin::Load,
                        result: gateway.fetch_version().await,
                    }
                });
            }
        }
    }

    /// Replace the store with server state while keeping local edits that
    /// have not been committed yet.
    fn apply_metadata(&mut self, metadata: Metadata) {
        let local: Vec<(ParamKey, f64)> = self
            .store
            .get()
            .changed_keys(&self.snapshot)
            .into_iter()
            .filter_map(|key| self.store.value(&key).map(|value| (key, value)))
            .collect();
        let count = metadata.params.len();
        self.snapshot = metadata.values.clone();
        self.store.replace_all(metadata);
        for (key, value) in local {
            if self.store.meta(&key).is_some() {
                debug!("keeping local value {value} for '{key}'");
                self.store.set(key, value);
            } else {
                debug!("dropping local value for removed parameter '{key}'");
            }
        }
        if self.debouncer.replace(self.store.get().clone()) {
            debug!("pending edits rebased on refreshed parameters");
        }
        info!("loaded {count} parameter(s)");
        self.emit(SyncEvent::ParametersLoaded { count });
        self.refresh_validation();
        self.rearm_uncommitted();
    }

    /// Local values that still differ from the server need a commit even when
    /// no edit is pending, e.g. a refresh cleared their validation error or an
    /// earlier commit failed.
    fn rearm_uncommitted(&mut self) {
        if self.debouncer.is_pending() {
            return;
        }
        if self.store.tracked().changed_keys(&self.snapshot).is_empty() {
            return;
        }
        if self.round.is_some() {
            self.deferred = true;
        } else {
            debug!("uncommitted local values after refresh, re-arming");
            self.debouncer.push(self.store.get().clone());
        }
    }

    fn refresh_validation(&mut self) {
        let before = self.validation.clone();
        if !self.validation.recompute(&self.store) {
            return;
        }
        let mut keys: Vec<ParamKey> = before.iter().map(|err| err.key.clone()).collect();
        for err in self.validation.iter() {
            if !keys.contains(&err.key) {
                keys.push(err.key.clone());
            }
        }
        for key in keys {
            let error = self.validation.get(&key).cloned();
            if before.get(&key) != error.as_ref() {
                self.emit(SyncEvent::ValidationChanged { key, error });
            }
        }
    }

    fn on_written(&mut self, results: Vec<(ParamKey, Result<(), SyncError>)>) {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        let mut first_error = None;
        for (key, result) in results {
            match result {
                Ok(()) => succeeded.push(key),
                Err(err) => {
                    warn!("write '{key}' failed: {err}");
                    first_error.get_or_insert(err);
                    failed.push(key);
                }
            }
        }
        if let Some(err) = first_error {
            let err = if succeeded.is_empty() {
                err
            } else {
                SyncError::PartialCommit { succeeded, failed }
            };
            self.report(err);
            self.end_round();
            return;
        }
        let gateway = Arc::clone(&self.gateway);
        self.spawn(async move {
            Completion::Version {
                origin: Origin::Commit,
                result: gateway.fetch_version().await,
            }
        });
    }

    fn adopt_and_fetch(&mut self, origin: Origin, version: u64) {
        if !self.tracker.adopt(version) {
            info!("ignoring version {version}, keeping {}", self.tracker.current());
            if origin != Origin::Push {
                self.end_round();
            }
            return;
        }
        if origin != Origin::Push {
            self.set_phase(SyncPhase::AwaitingArtifact(version));
        }
        let gateway = Arc::clone(&self.gateway);
        self.spawn(async move {
            Completion::Artifact {
                origin,
                version,
                result: gateway.fetch_artifact(version).await,
            }
        });
    }

    fn display(&mut self, version: u64, bytes: Arc<[u8]>) {
        if !self.tracker.should_display(version) {
            let current = self.tracker.current();
            debug!("discarding artifact v{version}, current is v{current}");
            self.emit(SyncEvent::ArtifactDiscarded { version, current });
            return;
        }
        if let Some(released) = self.slot.show(Artifact::new(version, bytes)) {
            debug!("released artifact v{}", released.version());
        }
        info!("displaying artifact v{version}");
        self.emit(SyncEvent::ArtifactDisplayed { version });
    }

    fn end_round(&mut self) {
        if let Some(Round::Commit(round)) = self.round.take() {
            if let Some(version) = round.version {
                self.snapshot = round.set;
                self.emit(SyncEvent::Committed {
                    keys: round.keys,
                    version,
                });
            }
        }
        self.set_phase(SyncPhase::Idle);
        if mem::take(&mut self.reload_requested) {
            self.start_load();
            return;
        }
        if mem::take(&mut self.deferred) {
            self.debouncer.push(self.store.get().clone());
        }
    }

    fn teardown(&mut self) {
        self.debouncer.cancel();
        self.inflight = FuturesUnordered::new();
        self.round = None;
        self.phase = SyncPhase::Idle;
        if let Some(released) = self.slot.clear() {
            debug!("released artifact v{}", released.version());
        }
        self.publish();
        info!("synchronization stopped");
    }

    fn set_phase(&mut self, phase: SyncPhase) {
        if self.phase != phase {
            debug!("phase {:?} -> {phase:?}", self.phase);
            self.phase = phase;
            self.emit(SyncEvent::PhaseChanged(phase));
        }
    }

    fn report(&mut self, err: SyncError) {
        warn!("{err}");
        self.emit(SyncEvent::Error(err));
    }

    fn emit(&self, event: SyncEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn spawn(&mut self, operation: impl Future<Output = Completion> + Send + 'static) {
        self.inflight.push(operation.boxed());
    }

    fn publish(&self) {
        let next = SyncStatus {
            phase: self.phase,
            current_version: self.tracker.current(),
            displayed_version: self.slot.displayed_version(),
            snapshot: self.snapshot.clone(),
            values: self.store.get().clone(),
            rows: self.store.view(),
            validation: self.validation.iter().cloned().collect(),
            metadata_loaded: self.store.is_loaded(),
            loading: matches!(self.round, Some(Round::Load)),
        };
        self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
