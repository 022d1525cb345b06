//! Session lifecycle: controller task plus optional live-update listener.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};
use tune_core::SyncError;

use crate::config::{SyncConfig, SyncOptions};
use crate::controller::{SyncController, SyncHandle};
use crate::gateway::Gateway;
use crate::http::HttpGateway;
use crate::live::{self, LiveUpdateListener, PushFrames};

/// A running synchronization session.
///
/// Dropping the session stops both background tasks; [`SyncSession::teardown`]
/// does the same but waits for the controller to release its state.
#[derive(Debug)]
pub struct SyncSession {
    handle: SyncHandle,
    controller: Option<JoinHandle<()>>,
    listener: Option<LiveUpdateListener>,
}

impl SyncSession {
    /// Spawn the controller (and a listener when `frames` is given).
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<G: Gateway>(
        gateway: Arc<G>,
        options: SyncOptions,
        frames: Option<PushFrames>,
    ) -> Self {
        let (controller, handle) = SyncController::new(gateway, options);
        let listener = frames.map(|frames| LiveUpdateListener::spawn(frames, handle.inputs()));
        let controller = tokio::spawn(controller.run());
        Self {
            handle,
            controller: Some(controller),
            listener,
        }
    }

    /// Start a session against the HTTP backend described by `config`.
    ///
    /// A live-update connection failure is logged and the session runs
    /// without push notices.
    pub async fn connect(config: &SyncConfig) -> Result<Self, SyncError> {
        let gateway = HttpGateway::new(&config.server)?;
        let frames = if config.sync.live_updates {
            match live::connect(&gateway.live_updates_url()).await {
                Ok(frames) => Some(frames),
                Err(err) => {
                    warn!("continuing without live updates: {err}");
                    None
                }
            }
        } else {
            None
        };
        Ok(Self::start(Arc::new(gateway), config.sync, frames))
    }

    /// Handle of the running controller.
    #[must_use]
    pub fn handle(&self) -> &SyncHandle {
        &self.handle
    }

    /// Mutable handle, needed to receive events.
    pub fn handle_mut(&mut self) -> &mut SyncHandle {
        &mut self.handle
    }

    /// A live-update listener is attached and not closed.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listener
            .as_ref()
            .is_some_and(|listener| !listener.is_closed())
    }

    /// Stop listening, stop the controller and wait for it to finish.
    /// Calling it again is a no-op.
    pub async fn teardown(&mut self) {
        if let Some(mut listener) = self.listener.take() {
            listener.close();
        }
        let Some(controller) = self.controller.take() else {
            return;
        };
        self.handle.shutdown();
        match controller.await {
            Ok(()) => debug!("session torn down"),
            Err(err) => warn!("controller task ended abnormally: {err}"),
        }
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        if let Some(mut listener) = self.listener.take() {
            listener.close();
        }
        if let Some(controller) = self.controller.take() {
            controller.abort();
        }
    }
}
