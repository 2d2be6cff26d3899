//! Configuration for a mirror, loadable from TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::glob::{GlobOptions, host_is_case_sensitive};
use crate::recovery::{AncestorWalk, DEFAULT_RETRY_DELAY, RecoveryStrategy};

/// Everything needed to start a mirror.
///
/// ```toml
/// source = "/home/me/project"
/// destination = "/mnt/backup/project"
/// patterns = "**/*.rs:!**/target/**"
/// mirror_deletions = true
///
/// [recovery]
/// max_attempts = 10
/// ceiling = "/home/me"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Directory to mirror from. Patterns are relative to it.
    pub source: Option<PathBuf>,

    /// Directory to mirror into.
    pub destination: Option<PathBuf>,

    /// Composite pattern string, separated like `PATH` entries.
    pub patterns: String,

    /// Whether deletions in the source are applied to the destination.
    pub mirror_deletions: bool,

    /// Copy existing matching entries whenever the source gets watched.
    pub initial_sync: bool,

    /// Activity log target: an absolute path or `stdout`.
    pub log_file: Option<String>,

    /// Tag included in start-up and stop log lines.
    pub tag: Option<String>,

    pub recovery: RecoveryConfig,

    pub matching: MatchingConfig,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            source: None,
            destination: None,
            patterns: "*".to_string(),
            mirror_deletions: false,
            initial_sync: false,
            log_file: None,
            tag: None,
            recovery: RecoveryConfig::default(),
            matching: MatchingConfig::default(),
        }
    }
}

impl MirrorConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn glob_options(&self) -> GlobOptions {
        GlobOptions {
            case_sensitive: self
                .matching
                .case_sensitive
                .unwrap_or_else(host_is_case_sensitive),
            recursive_wildcard_matches_volume: self.matching.recursive_wildcard_matches_volume,
        }
    }

    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        self.recovery.strategy()
    }
}

/// `[recovery]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Recover by walking ancestors. When false the first failure is final.
    pub enabled: bool,

    /// Consecutive failures before giving up. Unbounded when absent.
    pub max_attempts: Option<usize>,

    /// Pause between consecutive failed attempts.
    pub retry_delay_ms: u64,

    /// Never watch above this directory.
    pub ceiling: Option<PathBuf>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: None,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            ceiling: None,
        }
    }
}

impl RecoveryConfig {
    pub fn strategy(&self) -> RecoveryStrategy {
        if !self.enabled {
            return RecoveryStrategy::None;
        }
        RecoveryStrategy::WalkAncestors(AncestorWalk {
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            ceiling: self.ceiling.clone(),
        })
    }
}

/// `[matching]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Host default when absent.
    pub case_sensitive: Option<bool>,

    pub recursive_wildcard_matches_volume: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            case_sensitive: None,
            recursive_wildcard_matches_volume: true,
        }
    }
}
