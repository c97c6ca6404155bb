//! Registry configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationSecondsWithFrac, serde_as};

/// Tunables of a [`Registry`](crate::Registry).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use std::time::Duration;
/// use tuya_lights_rs::RegistryConfig;
///
/// let config: RegistryConfig = serde_json::from_str(r#"{"scan_timeout": 30}"#).unwrap();
/// assert_eq!(config.scan_timeout, Duration::from_secs(30));
/// assert_eq!(config.probe_concurrency, 8);
/// ```
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// How long a network scan may run before discovery fails.
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub scan_timeout: Duration,
    /// Hard ceiling for each individual link read or command.
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub link_timeout: Duration,
    /// Maximum number of connectivity probes in flight.
    pub probe_concurrency: usize,
    /// Entries kept in each controller's command history.
    pub history_capacity: usize,
}

impl RegistryConfig {
    pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(15);
    pub const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_PROBE_CONCURRENCY: usize = 8;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn with_link_timeout(mut self, timeout: Duration) -> Self {
        self.link_timeout = timeout;
        self
    }

    pub fn with_probe_concurrency(mut self, width: usize) -> Self {
        self.probe_concurrency = width;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Probe pool width, never zero.
    pub(crate) fn pool_width(&self) -> usize {
        self.probe_concurrency.max(1)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            scan_timeout: Self::DEFAULT_SCAN_TIMEOUT,
            link_timeout: Self::DEFAULT_LINK_TIMEOUT,
            probe_concurrency: Self::DEFAULT_PROBE_CONCURRENCY,
            history_capacity: crate::history::CommandHistory::DEFAULT_MAX_ENTRIES,
        }
    }
}
