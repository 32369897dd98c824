//! Reconciler configuration
//!
//! Each operation waits with its own [`WaitConfig`]. Durations are written
//! in humantime form (`30s`, `5m`) in YAML files.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{KubeError, Result};

/// Timing of one wait loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitConfig {
    /// Give up after this long
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Pause before the first poll
    #[serde(default = "default_delay", with = "humantime_serde")]
    pub delay: Duration,

    /// Pause between polls
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            delay: default_delay(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl WaitConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject configurations that could never poll
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(KubeError::InvalidConfig(
                "wait timeout must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(KubeError::InvalidConfig(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

/// Per-operation wait settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileConfig {
    #[serde(default)]
    pub create: WaitConfig,

    #[serde(default)]
    pub update: WaitConfig,

    #[serde(default)]
    pub delete: WaitConfig,
}

impl ReconcileConfig {
    /// Load from a YAML file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Same timeout for every operation
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.create.timeout = timeout;
        self.update.timeout = timeout;
        self.delete.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.create.validate()?;
        self.update.validate()?;
        self.delete.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ReconcileConfig::default();

        assert_eq!(config.create.timeout, Duration::from_secs(300));
        assert_eq!(config.update.delay, Duration::from_secs(5));
        assert_eq!(config.delete.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = ReconcileConfig::from_yaml(
            r#"
create:
  timeout: 10m
delete:
  delay: 1s
  pollInterval: 500ms
"#,
        )
        .unwrap();

        assert_eq!(config.create.timeout, Duration::from_secs(600));
        assert_eq!(config.create.delay, Duration::from_secs(5));
        assert_eq!(config.update, WaitConfig::default());
        assert_eq!(config.delete.delay, Duration::from_secs(1));
        assert_eq!(config.delete.poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = ReconcileConfig::from_yaml("update:\n  timeout: 0s\n").unwrap_err();
        assert!(matches!(err, KubeError::InvalidConfig(_)));
    }

    #[test]
    fn test_invalid_duration() {
        let err = ReconcileConfig::from_yaml("create:\n  timeout: soon\n").unwrap_err();
        assert!(matches!(err, KubeError::Serialization(_)));
    }

    #[test]
    fn test_with_timeout() {
        let config = ReconcileConfig::default().with_timeout(Duration::from_secs(30));

        assert_eq!(config.create.timeout, Duration::from_secs(30));
        assert_eq!(config.update.timeout, Duration::from_secs(30));
        assert_eq!(config.delete.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "create:\n  timeout: 2m").unwrap();

        let config = ReconcileConfig::load_from(file.path()).unwrap();
        assert_eq!(config.create.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ReconcileConfig::load_from("/nonexistent/kubemanifest.yaml").unwrap_err();
        assert!(matches!(err, KubeError::Io(_)));
    }
}
