//! Host configuration for the plugin subsystem.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Default deadline for every plugin RPC, in seconds.
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// Configuration of the plugin host.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Directory scanned for plugin executables; `None` registers only
    /// built-in drivers.
    pub plugin_dir: Option<PathBuf>,
    /// Deadline applied to every plugin RPC, in seconds.
    pub call_timeout_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            plugin_dir: None,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
        }
    }
}

impl HostConfig {
    /// Sets the plugin directory, returning `self`.
    #[must_use]
    pub fn with_plugin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugin_dir = Some(dir.into());
        self
    }

    /// Overrides the per-call deadline, returning `self`.
    #[must_use]
    pub const fn with_call_timeout_secs(mut self, secs: u64) -> Self {
        self.call_timeout_secs = secs;
        self
    }

    /// Returns the per-call deadline as a [`Duration`].
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn defaults_have_no_plugin_dir() {
        let config = HostConfig::default();
        assert!(config.plugin_dir.is_none());
        assert_eq!(config.call_timeout(), Duration::from_secs(30));
    }

    #[rstest]
    fn builder_overrides_apply() {
        let config = HostConfig::default()
            .with_plugin_dir("/opt/sqlward/plugins")
            .with_call_timeout_secs(5);
        assert_eq!(
            config.plugin_dir,
            Some(PathBuf::from("/opt/sqlward/plugins"))
        );
        assert_eq!(config.call_timeout(), Duration::from_secs(5));
    }

    #[rstest]
    fn deserialises_with_defaults() {
        let config: HostConfig =
            serde_json::from_str(r#"{"plugin_dir": "/plugins"}"#).expect("deserialize");
        assert_eq!(config.plugin_dir, Some(PathBuf::from("/plugins")));
        assert_eq!(config.call_timeout_secs, 30);
    }
}
