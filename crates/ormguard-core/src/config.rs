//! Engine configuration.

use serde::Deserialize;

use crate::error::{GuardError, GuardResult};

/// Default message surfaced for a denied field in ledger mode.
pub const DEFAULT_RESTRICTED_MESSAGE: &str = "is restricted from the current user";

/// What happens when a write or association mutation is denied.
///
/// One mode is chosen per deployment and applies to attribute writes and
/// association mutations alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    /// Skip the write, remember the field, fail validation later.
    #[default]
    Ledger,
    /// Reject the write immediately with `PermissionDenied`.
    FailFast,
}

/// Restriction engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Enforcement mode for denied writes.
    pub enforcement: EnforcementMode,

    /// Error message attached to denied fields in ledger mode.
    pub restricted_message: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enforcement: EnforcementMode::Ledger,
            restricted_message: DEFAULT_RESTRICTED_MESSAGE.to_string(),
        }
    }
}

impl GuardConfig {
    /// Create a configuration with defaults (ledger mode).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fail-fast configuration.
    pub fn fail_fast() -> Self {
        Self::default().with_enforcement(EnforcementMode::FailFast)
    }

    /// Set the enforcement mode.
    pub fn with_enforcement(mut self, enforcement: EnforcementMode) -> Self {
        self.enforcement = enforcement;
        self
    }

    /// Set the ledger-mode error message.
    pub fn with_restricted_message(mut self, message: impl Into<String>) -> Self {
        self.restricted_message = message.into();
        self
    }

    /// Parse a configuration from JSON. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> GuardResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| GuardError::Configuration(format!("invalid guard config: {}", e)))?;
        if config.restricted_message.trim().is_empty() {
            return Err(GuardError::Configuration(
                "restricted_message must not be empty".to_string(),
            ));
        }
        Ok(config)
    }

    /// Check if denied writes are ledgered.
    pub fn is_ledger(&self) -> bool {
        self.enforcement == EnforcementMode::Ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GuardConfig::new();
        assert_eq!(config.enforcement, EnforcementMode::Ledger);
        assert_eq!(config.restricted_message, DEFAULT_RESTRICTED_MESSAGE);
        assert!(config.is_ledger());
        assert!(!GuardConfig::fail_fast().is_ledger());
    }

    #[test]
    fn test_from_json() {
        let config = GuardConfig::from_json_str(r#"{"enforcement": "fail_fast"}"#).unwrap();
        assert_eq!(config.enforcement, EnforcementMode::FailFast);
        assert_eq!(config.restricted_message, DEFAULT_RESTRICTED_MESSAGE);

        let config = GuardConfig::from_json_str("{}").unwrap();
        assert_eq!(config, GuardConfig::default());
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        assert!(GuardConfig::from_json_str(r#"{"enforcement": "sometimes"}"#).is_err());
        assert!(GuardConfig::from_json_str(r#"{"restricted_message": "  "}"#).is_err());
    }
}
