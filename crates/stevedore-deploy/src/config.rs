//! Download tuning knobs, loaded from TOML.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::kind::ArtifactKind;

/// Logical directory whose link replaces an application's log folder.
pub const LOG_DIRECTORY: &str = "Log";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Retry budget, backoff and caching settings of a download manager.
///
/// Read once when the manager is built; there is no live reconfiguration.
///
/// # Examples
///
/// ```
/// use stevedore_deploy::DeploymentConfig;
///
/// let config = DeploymentConfig::default()
///     .with_max_failure_count(5)
///     .with_jitter_range_ms(0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Failures an application or service package download may record.
    ///
    /// Default: 20
    pub max_failure_count: u32,

    /// Failure budget of platform upgrade downloads. Falls back to
    /// `max_failure_count`.
    pub upgrade_max_failure_count: Option<u32>,

    /// Contention failures tolerated without touching the failure budget.
    ///
    /// Default: 3
    pub internal_retry_limit: u32,

    /// Default: true
    pub retry_on_internal_error: bool,

    /// Default: 10 000
    pub backoff_unit_ms: u64,

    /// Default: 3 600 000
    pub max_retry_interval_ms: u64,

    /// Default: 10 000
    pub jitter_range_ms: u64,

    /// Time budget of a single fetch attempt.
    ///
    /// Default: 600 000
    pub attempt_timeout_ms: u64,

    /// Whether service manifests may be pre-deployed into the image cache.
    ///
    /// Default: true
    pub image_caching_enabled: bool,

    /// Extra per-application directories, name to root. Each is linked into
    /// the application's work folder; [`LOG_DIRECTORY`] replaces the log folder.
    pub logical_directories: BTreeMap<String, PathBuf>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            max_failure_count:         20,
            upgrade_max_failure_count: None,
            internal_retry_limit:      3,
            retry_on_internal_error:   true,
            backoff_unit_ms:           10_000,
            max_retry_interval_ms:     3_600_000,
            jitter_range_ms:           10_000,
            attempt_timeout_ms:        600_000,
            image_caching_enabled:     true,
            logical_directories:       BTreeMap::new(),
        }
    }
}

impl DeploymentConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_failure_count == 0 {
            return Err(ConfigError::Invalid {
                field:  "max_failure_count",
                reason: "must be at least 1".into(),
            });
        }
        if self.upgrade_max_failure_count == Some(0) {
            return Err(ConfigError::Invalid {
                field:  "upgrade_max_failure_count",
                reason: "must be at least 1".into(),
            });
        }
        if self.attempt_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field:  "attempt_timeout_ms",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    pub fn max_failure_count_for(&self, kind: ArtifactKind) -> u32 {
        match kind {
            ArtifactKind::PlatformUpgrade => self.upgrade_max_failure_count.unwrap_or(self.max_failure_count),
            _ => self.max_failure_count,
        }
    }

    pub fn backoff_unit(&self) -> Duration { Duration::from_millis(self.backoff_unit_ms) }

    pub fn max_retry_interval(&self) -> Duration { Duration::from_millis(self.max_retry_interval_ms) }

    pub fn jitter_range(&self) -> Duration { Duration::from_millis(self.jitter_range_ms) }

    pub fn attempt_timeout(&self) -> Duration { Duration::from_millis(self.attempt_timeout_ms) }

    #[must_use]
    pub fn with_max_failure_count(mut self, count: u32) -> Self {
        self.max_failure_count = count;
        self
    }

    #[must_use]
    pub fn with_upgrade_max_failure_count(mut self, count: u32) -> Self {
        self.upgrade_max_failure_count = Some(count);
        self
    }

    #[must_use]
    pub fn with_internal_retry_limit(mut self, limit: u32) -> Self {
        self.internal_retry_limit = limit;
        self
    }

    #[must_use]
    pub fn with_retry_on_internal_error(mut self, retry: bool) -> Self {
        self.retry_on_internal_error = retry;
        self
    }

    #[must_use]
    pub fn with_backoff_unit_ms(mut self, ms: u64) -> Self {
        self.backoff_unit_ms = ms;
        self
    }

    #[must_use]
    pub fn with_max_retry_interval_ms(mut self, ms: u64) -> Self {
        self.max_retry_interval_ms = ms;
        self
    }

    #[must_use]
    pub fn with_jitter_range_ms(mut self, ms: u64) -> Self {
        self.jitter_range_ms = ms;
        self
    }

    #[must_use]
    pub fn with_attempt_timeout_ms(mut self, ms: u64) -> Self {
        self.attempt_timeout_ms = ms;
        self
    }

    #[must_use]
    pub fn with_image_caching_enabled(mut self, enabled: bool) -> Self {
        self.image_caching_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_logical_directory(mut self, name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.logical_directories.insert(name.into(), root.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = DeploymentConfig::from_toml_str("").unwrap();
        assert_eq!(config, DeploymentConfig::default());
        assert_eq!(config.max_failure_count_for(ArtifactKind::PlatformUpgrade), 20);
    }

    #[test]
    fn test_partial_toml() {
        let config = DeploymentConfig::from_toml_str(
            r#"
            max_failure_count = 5
            upgrade_max_failure_count = 2
            jitter_range_ms = 0

            [logical_directories]
            Log = "/mnt/logs"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_failure_count_for(ArtifactKind::ServicePackage), 5);
        assert_eq!(config.max_failure_count_for(ArtifactKind::PlatformUpgrade), 2);
        assert_eq!(config.jitter_range(), Duration::ZERO);
        assert_eq!(config.logical_directories[LOG_DIRECTORY], PathBuf::from("/mnt/logs"));
    }

    #[test]
    fn test_rejects_zero_budget() {
        let err = DeploymentConfig::from_toml_str("max_failure_count = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "max_failure_count", .. }));
        assert!(DeploymentConfig::default().with_attempt_timeout_ms(0).validate().is_err());
    }

    #[test]
    fn test_rejects_unparseable() {
        assert!(matches!(
            DeploymentConfig::from_toml_str("max_failure_count = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DeploymentConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
