//! Session timing configuration.
//!
//! ```toml
//! debounce_ms = 200
//! timeout_ms = 20000
//! max_reissues = 1
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::SessionError;

const DEFAULT_DEBOUNCE_MS: u64 = 200;
const DEFAULT_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_MAX_REISSUES: u32 = 1;
const MAX_DEBOUNCE_MS: u64 = 1_000;

/// How a session paces and bounds aggregation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Quiet period after a filter change before the store is queried.
    pub debounce: Duration,
    /// Longest a single aggregation may take before it counts as failed.
    pub timeout: Duration,
    /// Additional attempts after a failed or timed-out aggregation.
    pub max_reissues: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_reissues: DEFAULT_MAX_REISSUES,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SessionConfigDocument {
    debounce_ms: u64,
    timeout_ms: u64,
    max_reissues: u32,
}

impl Default for SessionConfigDocument {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_reissues: DEFAULT_MAX_REISSUES,
        }
    }
}

impl SessionConfig {
    /// Parses a config from TOML text. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for malformed TOML or
    /// [`SessionError::InvalidConfig`] for out-of-range values.
    pub fn from_toml(toml_str: &str) -> Result<Self, SessionError> {
        let document: SessionConfigDocument = toml::de::from_str(toml_str)?;
        Self {
            debounce: Duration::from_millis(document.debounce_ms),
            timeout: Duration::from_millis(document.timeout_ms),
            max_reissues: document.max_reissues,
        }
        .validate()
    }

    /// Reads a config file.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the file cannot be read, parsed, or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let config = Self::from_toml(&std::fs::read_to_string(path)?)?;
        log::info!("Loaded session config from {}: {config:?}", path.display());
        Ok(config)
    }

    /// Checks the debounce range and the timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] if the debounce exceeds one
    /// second or the timeout is zero.
    pub fn validate(self) -> Result<Self, SessionError> {
        if self.debounce > Duration::from_millis(MAX_DEBOUNCE_MS) {
            return Err(SessionError::InvalidConfig {
                message: format!(
                    "debounce of {}ms exceeds {MAX_DEBOUNCE_MS}ms",
                    self.debounce.as_millis()
                ),
            });
        }
        if self.timeout.is_zero() {
            return Err(SessionError::InvalidConfig {
                message: "timeout must be greater than zero".to_string(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        assert_eq!(SessionConfig::from_toml("").unwrap(), SessionConfig::default());
    }

    #[test]
    fn parses_all_keys() {
        let config = SessionConfig::from_toml(
            r"
            debounce_ms = 150
            timeout_ms = 5000
            max_reissues = 0
            ",
        )
        .unwrap();
        assert_eq!(config.debounce, Duration::from_millis(150));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_reissues, 0);
    }

    #[test]
    fn rejects_long_debounce_and_zero_timeout() {
        assert!(matches!(
            SessionConfig::from_toml("debounce_ms = 1500"),
            Err(SessionError::InvalidConfig { .. })
        ));
        assert!(matches!(
            SessionConfig::from_toml("timeout_ms = 0"),
            Err(SessionError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(matches!(
            SessionConfig::from_toml("debounce = 10"),
            Err(SessionError::Config(_))
        ));
    }
}
