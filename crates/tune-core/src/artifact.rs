//! Rendered artifacts and the slot that displays them.

use std::sync::Arc;

use tokio::sync::watch;

/// An immutable rendered artifact for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    version: u64,
    bytes: Arc<[u8]>,
}

impl Artifact {
    /// Wrap the bytes fetched for `version`.
    pub fn new(version: u64, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            version,
            bytes: bytes.into(),
        }
    }

    /// Version the artifact was rendered for.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Raw artifact bytes (a PNG for the stock backend).
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for a zero-length body.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Holds the displayed artifact and publishes it to observers.
///
/// Replacing or clearing the artifact hands the previous one back so the
/// caller decides when it is released.
#[derive(Debug)]
pub struct ArtifactSlot {
    tx: watch::Sender<Option<Artifact>>,
}

impl Default for ArtifactSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactSlot {
    /// An empty slot.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Display `artifact`, returning the one it replaces.
    pub fn show(&self, artifact: Artifact) -> Option<Artifact> {
        self.tx.send_replace(Some(artifact))
    }

    /// Stop displaying anything, returning what was shown.
    pub fn clear(&self) -> Option<Artifact> {
        self.tx.send_replace(None)
    }

    /// The artifact on display, if any.
    #[must_use]
    pub fn current(&self) -> Option<Artifact> {
        self.tx.borrow().clone()
    }

    /// Version of the artifact on display.
    #[must_use]
    pub fn displayed_version(&self) -> Option<u64> {
        self.tx.borrow().as_ref().map(Artifact::version)
    }

    /// Observe every change of the displayed artifact.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Artifact>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_returns_the_replaced_artifact() {
        let slot = ArtifactSlot::new();
        let mut rx = slot.subscribe();
        assert_eq!(slot.show(Artifact::new(3, b"v3".to_vec())), None);
        let released = slot.show(Artifact::new(4, b"v4".to_vec()));
        assert_eq!(released.map(|artifact| artifact.version()), Some(3));
        assert_eq!(slot.displayed_version(), Some(4));
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(
            rx.borrow_and_update().as_ref().map(Artifact::bytes),
            Some(&b"v4"[..])
        );
    }

    #[test]
    fn clear_releases_without_observers() {
        let slot = ArtifactSlot::new();
        slot.show(Artifact::new(1, vec![1, 2, 3]));
        let released = slot.clear();
        assert_eq!(released.map(|artifact| artifact.len()), Some(3));
        assert_eq!(slot.current(), None);
    }
}
