//! Configuration for the sync engine.
//!
//! Sources and precedence (highest wins):
//! 1. Environment variables (`ISSUESYNC_OWNER`, `ISSUESYNC_REPO`,
//!    `ISSUESYNC_PATH`, `ISSUESYNC_API_BASE`, `ISSUESYNC_TOKEN`)
//! 2. Project config file (YAML)
//! 3. Defaults
//!
//! The auth token is env-only and never written to the config file.

use crate::error::{Result, SyncError};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default record file path inside the repository.
const DEFAULT_RECORD_PATH: &str = ".issues/issues.jsonl";
/// Marker directory whose presence confirms a repository hosts a record store.
const DEFAULT_MARKER_DIR: &str = ".issues";
/// Default offline editing window.
const DEFAULT_EDIT_WINDOW_DAYS: i64 = 7;

/// The repository and file the engine synchronizes against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoTarget {
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Path of the record file inside the repository.
    #[serde(default = "default_record_path")]
    pub path: String,
    /// Marker directory used by the pre-registration probe.
    #[serde(default = "default_marker_dir")]
    pub marker: String,
}

fn default_record_path() -> String {
    DEFAULT_RECORD_PATH.to_string()
}

fn default_marker_dir() -> String {
    DEFAULT_MARKER_DIR.to_string()
}

impl RepoTarget {
    #[must_use]
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            path: default_record_path(),
            marker: default_marker_dir(),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Target repository and record file.
    pub target: RepoTarget,

    /// Hosting API base URL override (tests, enterprise hosts).
    #[serde(default)]
    pub api_base: Option<String>,

    /// Commit message used for record-file writes.
    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    /// Offline editing window length, in days.
    #[serde(default = "default_edit_window_days")]
    pub edit_window_days: i64,

    /// Path of the local queue database.
    #[serde(default = "default_queue_db")]
    pub queue_db: PathBuf,

    /// Auth token for the hosting API. Env-only; never serialized.
    #[serde(skip)]
    pub auth_token: Option<String>,
}

fn default_commit_message() -> String {
    "Sync issue records".to_string()
}

fn default_edit_window_days() -> i64 {
    DEFAULT_EDIT_WINDOW_DAYS
}

fn default_queue_db() -> PathBuf {
    PathBuf::from(".issuesync/queue.db")
}

impl SyncConfig {
    /// Build a config with defaults for everything but the target.
    #[must_use]
    pub fn new(target: RepoTarget) -> Self {
        Self {
            target,
            api_base: None,
            commit_message: default_commit_message(),
            edit_window_days: default_edit_window_days(),
            queue_db: default_queue_db(),
            auth_token: None,
        }
    }

    /// Load configuration from a YAML file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// result is missing the owner/repo after overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut config: Self = serde_yaml::from_str(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Build a config purely from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when `ISSUESYNC_OWNER` or `ISSUESYNC_REPO` is unset.
    pub fn from_env() -> Result<Self> {
        let owner = env::var("ISSUESYNC_OWNER")
            .map_err(|_| SyncError::Config("ISSUESYNC_OWNER not set".to_string()))?;
        let repo = env::var("ISSUESYNC_REPO")
            .map_err(|_| SyncError::Config("ISSUESYNC_REPO not set".to_string()))?;
        let mut config = Self::new(RepoTarget::new(owner, repo));
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(owner) = env::var("ISSUESYNC_OWNER") {
            self.target.owner = owner;
        }
        if let Ok(repo) = env::var("ISSUESYNC_REPO") {
            self.target.repo = repo;
        }
        if let Ok(path) = env::var("ISSUESYNC_PATH") {
            self.target.path = path;
        }
        if let Ok(api_base) = env::var("ISSUESYNC_API_BASE") {
            self.api_base = Some(api_base);
        }
        if let Ok(token) = env::var("ISSUESYNC_TOKEN") {
            self.auth_token = Some(token);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.target.owner.trim().is_empty() {
            return Err(SyncError::Config("repository owner is empty".to_string()));
        }
        if self.target.repo.trim().is_empty() {
            return Err(SyncError::Config("repository name is empty".to_string()));
        }
        if self.edit_window_days <= 0 {
            return Err(SyncError::Config(
                "edit_window_days must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Offline editing window as a duration.
    #[must_use]
    pub fn edit_window(&self) -> Duration {
        Duration::days(self.edit_window_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_with_defaults() {
        let yaml = "target:\n  owner: acme\n  repo: issues\n";
        let config: SyncConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.target.owner, "acme");
        assert_eq!(config.target.path, DEFAULT_RECORD_PATH);
        assert_eq!(config.target.marker, DEFAULT_MARKER_DIR);
        assert_eq!(config.edit_window_days, 7);
    }

    #[test]
    fn edit_window_duration() {
        let config = SyncConfig::new(RepoTarget::new("acme", "issues"));
        assert_eq!(config.edit_window(), Duration::days(7));
    }

    #[test]
    fn validate_rejects_empty_owner() {
        let config = SyncConfig::new(RepoTarget::new("", "issues"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn token_is_never_serialized() {
        let mut config = SyncConfig::new(RepoTarget::new("acme", "issues"));
        config.auth_token = Some("secret".to_string());
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("secret"));
    }
}
