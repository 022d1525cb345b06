//! Artifact version arbitration.

use smol_str::SmolStr;
use tracing::debug;

use crate::error::SyncError;

/// How the tracker treats a version lower than the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionPolicy {
    /// Every adopt wins, whatever its value.
    #[default]
    LastAdopt,
    /// Versions lower than the current one are rejected.
    Highest,
}

impl VersionPolicy {
    /// Parse the `sync.version_policy` config value.
    pub fn parse(text: &str) -> Result<Self, SyncError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "last_adopt" | "last-adopt" | "last" => Ok(Self::LastAdopt),
            "highest" => Ok(Self::Highest),
            _ => Err(SyncError::Config(SmolStr::new(format!(
                "invalid sync.version_policy '{text}' (expected last_adopt or highest)"
            )))),
        }
    }

    /// Config spelling of the policy.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LastAdopt => "last_adopt",
            Self::Highest => "highest",
        }
    }
}

/// Last known artifact version and the display decision derived from it.
#[derive(Debug, Clone, Default)]
pub struct VersionTracker {
    current: u64,
    policy: VersionPolicy,
}

impl VersionTracker {
    /// A tracker at version 0.
    #[must_use]
    pub fn new(policy: VersionPolicy) -> Self {
        Self { current: 0, policy }
    }

    /// Last adopted version.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.current
    }

    /// Policy applied by [`VersionTracker::adopt`].
    #[must_use]
    pub fn policy(&self) -> VersionPolicy {
        self.policy
    }

    /// Make `version` current. Returns `false` when the policy rejects it.
    pub fn adopt(&mut self, version: u64) -> bool {
        if self.policy == VersionPolicy::Highest && version < self.current {
            debug!("rejecting version {version}, current is {}", self.current);
            return false;
        }
        self.current = version;
        true
    }

    /// Only the artifact of the current version may be shown.
    #[must_use]
    pub fn should_display(&self, version: u64) -> bool {
        version == self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_adopt_wins() {
        let mut tracker = VersionTracker::new(VersionPolicy::LastAdopt);
        assert!(tracker.adopt(7));
        assert!(tracker.adopt(6));
        assert_eq!(tracker.current(), 6);
        assert!(tracker.should_display(6));
        assert!(!tracker.should_display(7));
    }

    #[test]
    fn highest_rejects_regressions() {
        let mut tracker = VersionTracker::new(VersionPolicy::Highest);
        assert!(tracker.adopt(7));
        assert!(!tracker.adopt(6));
        assert!(tracker.adopt(7));
        assert_eq!(tracker.current(), 7);
        assert!(!tracker.should_display(6));
    }

    #[test]
    fn policy_names() {
        assert_eq!(VersionPolicy::parse("Highest"), Ok(VersionPolicy::Highest));
        assert_eq!(VersionPolicy::parse("last_adopt"), Ok(VersionPolicy::LastAdopt));
        assert!(matches!(
            VersionPolicy::parse("newest"),
            Err(SyncError::Config(_))
        ));
    }
}
