//! Live-update listener.
//!
//! The backend pushes `param_updated` notices over a WebSocket. The listener
//! decodes them and forwards each one to the controller as
//! [`SyncInput::Push`]. It never reconnects: when the stream errors or closes
//! it reports [`SyncInput::LiveUpdatesClosed`] and stops.

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use smol_str::SmolStr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use tune_core::SyncError;

use crate::controller::SyncInput;
use crate::wire::{self, PushEvent};

/// Text frames of a push stream.
pub type PushFrames = BoxStream<'static, Result<String, SyncError>>;

/// Open the live-update WebSocket at `url`.
pub async fn connect(url: &str) -> Result<PushFrames, SyncError> {
    let (socket, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|err| SyncError::transport("connect live updates", None, err.to_string()))?;
    info!("listening for live updates on {url}");
    let frames = socket.filter_map(|message| async move {
        match message {
            Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => Some(Ok(text)),
                Err(_) => {
                    warn!("ignoring binary live update frame ({} bytes)", bytes.len());
                    None
                }
            },
            Ok(Message::Close(frame)) => {
                debug!("live updates close frame: {frame:?}");
                None
            }
            Ok(_) => None,
            Err(err) => Some(Err(SyncError::transport(
                "live updates",
                None,
                err.to_string(),
            ))),
        }
    });
    Ok(frames.boxed())
}

/// Background task forwarding push notices to the controller.
#[derive(Debug)]
pub struct LiveUpdateListener {
    task: Option<JoinHandle<()>>,
}

impl LiveUpdateListener {
    /// Start forwarding `frames` to `inputs`.
    pub fn spawn(frames: PushFrames, inputs: mpsc::UnboundedSender<SyncInput>) -> Self {
        let task = tokio::spawn(listen(frames, inputs));
        Self { task: Some(task) }
    }

    /// Stop listening. Only the first call has an effect.
    pub fn close(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                debug!("live update listener closed");
                true
            }
            None => false,
        }
    }

    /// [`LiveUpdateListener::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for LiveUpdateListener {
    fn drop(&mut self) {
        self.close();
    }
}

async fn listen(mut frames: PushFrames, inputs: mpsc::UnboundedSender<SyncInput>) {
    let reason: SmolStr = loop {
        match frames.next().await {
            Some(Ok(text)) => match wire::decode_push(&text) {
                Ok(Some(PushEvent::ParamUpdated { version })) => {
                    if inputs.send(SyncInput::Push { version }).is_err() {
                        return;
                    }
                }
                Ok(None) => debug!("ignoring live update: {text}"),
                Err(err) => warn!("dropping malformed live update: {err}"),
            },
            Some(Err(err)) => break err.to_string().into(),
            None => break "stream ended".into(),
        }
    };
    // The controller may already be gone.
    let _ = inputs.send(SyncInput::LiveUpdatesClosed { reason });
}
