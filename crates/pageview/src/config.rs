//! Runtime configuration.
//!
//! Timeouts and polling intervals for page safety, navigation arrival, fill
//! strategies, alerts and tree expansion. Every blocking wait in the crate reads
//! its bound from here.

use crate::result::{ViewError, ViewResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default arrival timeout after a navigation step (10 seconds)
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 10_000;

/// Default hard limit for page quiescence (20 seconds)
pub const DEFAULT_PAGE_SAFE_TIMEOUT_MS: u64 = 20_000;

/// Default polling interval for readiness checks (200ms)
pub const DEFAULT_POLL_MS: u64 = 200;

/// Alerts accepted automatically while waiting for the page to settle
pub const ABANDON_CHANGES_ALERT: &str = "Abandon changes?";

/// Configuration for a browser session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How long a destination view may take to display after its step
    pub navigation_timeout_ms: u64,
    /// Polling interval while waiting for arrival
    pub navigation_poll_ms: u64,
    /// Extra navigation attempts after an unexpected alert
    pub navigation_retries: u32,
    /// Hard limit for `ensure_page_safe`
    pub page_safe_timeout_ms: u64,
    /// Polling interval for `ensure_page_safe`
    pub page_safe_poll_ms: u64,
    /// Default timeout for the wait fill strategy
    pub fill_wait_timeout_ms: u64,
    /// How long to wait for an alert that is expected to appear
    pub alert_wait_ms: u64,
    /// Bound on lazy tree loads
    pub tree_load_timeout_ms: u64,
    /// Bound on a single tree node expansion
    pub tree_expand_timeout_ms: u64,
    /// Minimum pause after typing into an observed field
    pub observed_field_wait_ms: u64,
    /// Alert texts accepted automatically by the page-safety check
    pub auto_accept_alerts: Vec<String>,
    /// Log filter used by [`crate::init_tracing`] when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            navigation_poll_ms: DEFAULT_POLL_MS,
            navigation_retries: 2,
            page_safe_timeout_ms: DEFAULT_PAGE_SAFE_TIMEOUT_MS,
            page_safe_poll_ms: DEFAULT_POLL_MS,
            fill_wait_timeout_ms: 5_000,
            alert_wait_ms: 10_000,
            tree_load_timeout_ms: 30_000,
            tree_expand_timeout_ms: 15_000,
            observed_field_wait_ms: 800,
            auto_accept_alerts: vec![ABANDON_CHANGES_ALERT.to_string()],
            log_filter: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new builder
    #[must_use]
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Parse a YAML document; missing keys keep their defaults
    pub fn from_yaml(yaml: &str) -> ViewResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file
    pub fn load(path: impl AsRef<Path>) -> ViewResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> ViewResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Reject zero timeouts and poll intervals
    pub fn validate(&self) -> ViewResult<()> {
        let checks = [
            ("navigation_timeout_ms", self.navigation_timeout_ms),
            ("navigation_poll_ms", self.navigation_poll_ms),
            ("page_safe_timeout_ms", self.page_safe_timeout_ms),
            ("page_safe_poll_ms", self.page_safe_poll_ms),
            ("fill_wait_timeout_ms", self.fill_wait_timeout_ms),
            ("tree_load_timeout_ms", self.tree_load_timeout_ms),
            ("tree_expand_timeout_ms", self.tree_expand_timeout_ms),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(ViewError::Config {
                    message: format!("{name} must be greater than zero"),
                });
            }
        }
        Ok(())
    }

    /// Whether an alert with this text is accepted during page-safety checks
    #[must_use]
    pub fn auto_accepts(&self, alert_text: &str) -> bool {
        self.auto_accept_alerts.iter().any(|t| t == alert_text)
    }
}

/// Builder for `RuntimeConfig`
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    /// Set the arrival timeout
    #[must_use]
    pub fn navigation_timeout_ms(mut self, ms: u64) -> Self {
        self.config.navigation_timeout_ms = ms;
        self
    }

    /// Set the arrival polling interval
    #[must_use]
    pub fn navigation_poll_ms(mut self, ms: u64) -> Self {
        self.config.navigation_poll_ms = ms;
        self
    }

    /// Set the number of extra navigation attempts
    #[must_use]
    pub fn navigation_retries(mut self, retries: u32) -> Self {
        self.config.navigation_retries = retries;
        self
    }

    /// Set the page-safety hard limit
    #[must_use]
    pub fn page_safe_timeout_ms(mut self, ms: u64) -> Self {
        self.config.page_safe_timeout_ms = ms;
        self
    }

    /// Set the page-safety polling interval
    #[must_use]
    pub fn page_safe_poll_ms(mut self, ms: u64) -> Self {
        self.config.page_safe_poll_ms = ms;
        self
    }

    /// Set the wait fill strategy timeout
    #[must_use]
    pub fn fill_wait_timeout_ms(mut self, ms: u64) -> Self {
        self.config.fill_wait_timeout_ms = ms;
        self
    }

    /// Set the alert wait
    #[must_use]
    pub fn alert_wait_ms(mut self, ms: u64) -> Self {
        self.config.alert_wait_ms = ms;
        self
    }

    /// Set tree timeouts (lazy load, single expansion)
    #[must_use]
    pub fn tree_timeouts_ms(mut self, load: u64, expand: u64) -> Self {
        self.config.tree_load_timeout_ms = load;
        self.config.tree_expand_timeout_ms = expand;
        self
    }

    /// Set the observed field pause
    #[must_use]
    pub fn observed_field_wait_ms(mut self, ms: u64) -> Self {
        self.config.observed_field_wait_ms = ms;
        self
    }

    /// Add an alert text that page-safety checks accept
    #[must_use]
    pub fn auto_accept_alert(mut self, text: impl Into<String>) -> Self {
        self.config.auto_accept_alerts.push(text.into());
        self
    }

    /// Set the log filter
    #[must_use]
    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.log_filter = filter.into();
        self
    }

    /// Build and validate
    pub fn build(self) -> ViewResult<RuntimeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
