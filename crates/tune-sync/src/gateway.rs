//! Remote gateway abstraction.
//!
//! The gateway is the only place that talks to the backend. The controller
//! holds it behind an `Arc` and runs several calls concurrently, so every
//! method returns a `Send` future that does not borrow across the call.

use std::future::Future;
use std::sync::Arc;

use tune_core::{Metadata, SyncError};

/// Operations the controller needs from the backend.
pub trait Gateway: Send + Sync + 'static {
    /// Values, metadata and display order of every parameter.
    fn fetch_metadata(&self) -> impl Future<Output = Result<Metadata, SyncError>> + Send;

    /// Version of the most recent artifact.
    fn fetch_version(&self) -> impl Future<Output = Result<u64, SyncError>> + Send;

    /// Artifact bytes for `version`, bypassing any cache.
    fn fetch_artifact(
        &self,
        version: u64,
    ) -> impl Future<Output = Result<Arc<[u8]>, SyncError>> + Send;

    /// Write one parameter value.
    fn write_parameter(
        &self,
        key: &str,
        value: f64,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;
}
