//! `tune-core` - parameter model and the synchronous building blocks of the
//! tune synchronization engine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Displayed artifact and its release slot.
pub mod artifact;
/// Time-delay value stabilizer.
pub mod debounce;
/// Error taxonomy shared by the engine.
pub mod error;
/// Parameter keys, metadata and ordered sets.
pub mod model;
/// Local parameter store.
pub mod store;
/// Bounds validation.
pub mod validate;
/// Artifact version arbitration.
pub mod version;

pub use artifact::{Artifact, ArtifactSlot};
pub use debounce::Debouncer;
pub use error::SyncError;
pub use model::{KeyOrder, Metadata, ParamKey, ParamMeta, ParameterSet, WidgetKind};
pub use store::{ParamRow, ParameterStore};
pub use validate::{validate, ValidationError, ValidationErrors, Violation};
pub use version::{VersionPolicy, VersionTracker};
