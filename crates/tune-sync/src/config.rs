//! Client configuration (`tune.toml`).
//!
//! ```toml
//! [server]
//! base_url = "http://127.0.0.1:8000"
//! request_timeout_ms = 5000
//!
//! [sync]
//! debounce_ms = 500
//! write_mode = "changed"        # or "all"
//! version_policy = "last_adopt" # or "highest"
//! live_updates = true
//!
//! [log]
//! level = "info"
//! ```
//!
//! Every section and key is optional.

#![allow(missing_docs)]

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use smol_str::SmolStr;
use tune_core::{SyncError, VersionPolicy};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Which keys a commit round writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Only keys that differ from the last committed snapshot.
    #[default]
    Changed,
    /// Every key with metadata.
    All,
}

impl WriteMode {
    pub fn parse(text: &str) -> Result<Self, SyncError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "changed" => Ok(Self::Changed),
            "all" => Ok(Self::All),
            _ => Err(SyncError::config(format!(
                "invalid sync.write_mode '{text}' (expected changed or all)"
            ))),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Changed => "changed",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub base_url: SmolStr,
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Controller tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub debounce: Duration,
    pub write_mode: WriteMode,
    pub version_policy: VersionPolicy,
    pub live_updates: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            write_mode: WriteMode::default(),
            version_policy: VersionPolicy::default(),
            live_updates: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub server: ServerConfig,
    pub sync: SyncOptions,
    pub log_level: SmolStr,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            sync: SyncOptions::default(),
            log_level: "info".into(),
        }
    }
}

impl SyncConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| SyncError::config(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&text)
            .map_err(|err| SyncError::config(format!("{}: {err}", path.display())))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, SyncError> {
        let raw: TuneToml =
            toml::from_str(text).map_err(|err| SyncError::config(format!("tune.toml: {err}")))?;
        raw.into_config()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TuneToml {
    server: Option<ServerSection>,
    sync: Option<SyncSection>,
    log: Option<LogSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerSection {
    base_url: Option<String>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SyncSection {
    debounce_ms: Option<u64>,
    write_mode: Option<String>,
    version_policy: Option<String>,
    live_updates: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogSection {
    level: String,
}

impl TuneToml {
    fn into_config(self) -> Result<SyncConfig, SyncError> {
        let defaults = SyncConfig::default();

        let server = match self.server {
            Some(section) => {
                let base_url = match section.base_url {
                    Some(url) => parse_base_url(&url)?,
                    None => defaults.server.base_url,
                };
                let request_timeout = match section.request_timeout_ms {
                    Some(0) => {
                        return Err(SyncError::config(
                            "server.request_timeout_ms must be greater than zero",
                        ))
                    }
                    Some(ms) => Duration::from_millis(ms),
                    None => defaults.server.request_timeout,
                };
                ServerConfig {
                    base_url,
                    request_timeout,
                }
            }
            None => defaults.server,
        };

        let sync = match self.sync {
            Some(section) => SyncOptions {
                debounce: section
                    .debounce_ms
                    .map_or(defaults.sync.debounce, Duration::from_millis),
                write_mode: section
                    .write_mode
                    .as_deref()
                    .map(WriteMode::parse)
                    .transpose()?
                    .unwrap_or_default(),
                version_policy: section
                    .version_policy
                    .as_deref()
                    .map(VersionPolicy::parse)
                    .transpose()?
                    .unwrap_or_default(),
                live_updates: section.live_updates.unwrap_or(defaults.sync.live_updates),
            },
            None => defaults.sync,
        };

        let log_level = match self.log {
            Some(section) => parse_log_level(&section.level)?,
            None => defaults.log_level,
        };

        Ok(SyncConfig {
            server,
            sync,
            log_level,
        })
    }
}

/// Validate a backend base URL and strip trailing slashes.
pub fn parse_base_url(text: &str) -> Result<SmolStr, SyncError> {
    let trimmed = text.trim().trim_end_matches('/');
    let rest = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"));
    match rest {
        Some(host) if !host.is_empty() => Ok(trimmed.into()),
        _ => Err(SyncError::config(format!(
            "invalid server.base_url '{text}' (expected http:// or https:// URL)"
        ))),
    }
}

fn parse_log_level(text: &str) -> Result<SmolStr, SyncError> {
    let level = text.trim().to_ascii_lowercase();
    match level.as_str() {
        "error" | "warn" | "info" | "debug" | "trace" => Ok(level.into()),
        _ => Err(SyncError::config(format!("invalid log.level '{text}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = SyncConfig::from_toml_str("").expect("parse");
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.sync.debounce, Duration::from_millis(500));
        assert_eq!(config.sync.write_mode, WriteMode::Changed);
        assert_eq!(config.sync.version_policy, VersionPolicy::LastAdopt);
    }

    #[test]
    fn full_file_is_parsed() {
        let config = SyncConfig::from_toml_str(
            r#"
[server]
base_url = "https://render.local:9000/"
request_timeout_ms = 2500

[sync]
debounce_ms = 250
write_mode = "ALL"
version_policy = "highest"
live_updates = false

[log]
level = "Debug"
"#,
        )
        .expect("parse");
        assert_eq!(config.server.base_url, "https://render.local:9000");
        assert_eq!(config.server.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.sync.debounce, Duration::from_millis(250));
        assert_eq!(config.sync.write_mode, WriteMode::All);
        assert_eq!(config.sync.version_policy, VersionPolicy::Highest);
        assert!(!config.sync.live_updates);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for text in [
            "[sync]\nwrite_mode = \"some\"",
            "[sync]\nversion_policy = \"newest\"",
            "[server]\nbase_url = \"ftp://x\"",
            "[server]\nrequest_timeout_ms = 0",
            "[log]\nlevel = \"loud\"",
            "[sync]\nunknown = 1",
        ] {
            let err = SyncConfig::from_toml_str(text).expect_err(text);
            assert!(matches!(err, SyncError::Config(_)), "{text}: {err}");
        }
    }
}
