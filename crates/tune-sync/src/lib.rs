//! `tune-sync` - talks to the rendering backend and keeps local parameters,
//! remote parameters and the displayed artifact consistent.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Client configuration (`tune.toml`).
pub mod config;
/// Reconciliation state machine.
pub mod controller;
/// Remote gateway abstraction.
pub mod gateway;
/// HTTP implementation of the gateway.
pub mod http;
/// Server push listener.
pub mod live;
/// Session lifecycle.
pub mod session;
/// Wire formats of the backend.
pub mod wire;

pub use config::{ServerConfig, SyncConfig, SyncOptions, WriteMode};
pub use controller::{SyncController, SyncEvent, SyncHandle, SyncInput, SyncPhase, SyncStatus};
pub use gateway::Gateway;
pub use http::HttpGateway;
pub use live::{LiveUpdateListener, PushFrames};
pub use session::SyncSession;
pub use tune_core::*;
