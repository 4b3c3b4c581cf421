use std::num::NonZeroU64;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct AidotConfig {
    /// Stored config entry (login response, house, device and product lists)
    pub entry_file: Utf8PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct SessionConfig {
    /// Fixed pause before re-reading after a failed status read
    pub read_retry_secs: NonZeroU64,
    pub initial_request: bool,
}

impl SessionConfig {
    pub const DEFAULT_READ_RETRY_SECS: u64 = 5;

    #[must_use]
    pub const fn read_retry(&self) -> Duration {
        Duration::from_secs(self.read_retry_secs.get())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_retry_secs: NonZeroU64::new(Self::DEFAULT_READ_RETRY_SECS)
                .unwrap_or(NonZeroU64::MIN),
            initial_request: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct CoordinatorConfig {
    pub refresh_interval_secs: NonZeroU64,
}

impl CoordinatorConfig {
    pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 600;

    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.get())
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: NonZeroU64::new(Self::DEFAULT_REFRESH_INTERVAL_SECS)
                .unwrap_or(NonZeroU64::MIN),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub aidot: AidotConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::config::{CoordinatorConfig, SessionConfig};

    #[test]
    fn defaults_match_observed_timings() {
        assert_eq!(SessionConfig::default().read_retry().as_secs(), 5);
        assert_eq!(CoordinatorConfig::default().refresh_interval().as_secs(), 600);
    }

    #[test]
    fn zero_read_retry_is_rejected() {
        let res = serde_json::from_value::<SessionConfig>(json!({
            "read_retry_secs": 0,
            "initial_request": true,
        }));
        assert!(res.is_err());

        let cfg: SessionConfig = serde_json::from_value(json!({
            "read_retry_secs": 2,
            "initial_request": false,
        }))
        .unwrap();
        assert_eq!(cfg.read_retry().as_secs(), 2);
    }

    #[test]
    fn zero_refresh_interval_is_rejected() {
        let res = serde_json::from_value::<CoordinatorConfig>(json!({
            "refresh_interval_secs": 0,
        }));
        assert!(res.is_err());
    }
}
