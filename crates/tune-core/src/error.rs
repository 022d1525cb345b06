//! Synchronization errors.

#![allow(missing_docs)]

use smol_str::SmolStr;
use thiserror::Error;

use crate::model::ParamKey;
use crate::validate::ValidationError;

/// Errors surfaced by the synchronization engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    /// Network failure or non-success HTTP status.
    #[error("{operation} failed{}: {message}", status_suffix(.status))]
    Transport {
        operation: SmolStr,
        status: Option<u16>,
        message: SmolStr,
    },

    /// A parameter value is outside its declared bounds.
    #[error(transparent)]
    Validation(ValidationError),

    /// The server answered with a body we could not interpret.
    #[error("malformed {operation} response: {message}")]
    Protocol { operation: SmolStr, message: SmolStr },

    /// Some, but not all, writes of a commit round were accepted.
    #[error(
        "partial commit: wrote {}, failed {}",
        key_list(.succeeded),
        key_list(.failed)
    )]
    PartialCommit {
        succeeded: Vec<ParamKey>,
        failed: Vec<ParamKey>,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("invalid config: {0}")]
    Config(SmolStr),
}

impl SyncError {
    pub fn transport(
        operation: impl Into<SmolStr>,
        status: Option<u16>,
        message: impl Into<SmolStr>,
    ) -> Self {
        Self::Transport {
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }

    pub fn protocol(operation: impl Into<SmolStr>, message: impl Into<SmolStr>) -> Self {
        Self::Protocol {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<SmolStr>) -> Self {
        Self::Config(message.into())
    }

    /// HTTP status attached to a transport error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

#[allow(clippy::ref_option)]
fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" with status {code}"))
        .unwrap_or_default()
}

fn key_list(keys: &[ParamKey]) -> String {
    if keys.is_empty() {
        return "nothing".to_string();
    }
    keys.iter()
        .map(|key| format!("'{key}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
