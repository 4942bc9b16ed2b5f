//! Engine tuning parameters.
//!
//! All thresholds that influence state-machine decisions live here so
//! that callers (and tests) never hardcode them at use sites.

use serde::{Deserialize, Serialize};

/// Tuning parameters for the session engine.
///
/// Loaded from `~/.vigil/config.toml` by the infrastructure layer;
/// every field has a default so a missing or partial file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Intent confidence below this value is treated as ambiguous and
    /// routed to clarification instead of execution.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// How long a destructive-command confirmation stays open, in
    /// milliseconds.
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
    /// Upper bound on suggestions returned per turn.
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

fn default_confidence_threshold() -> f64 {
    0.6
}

fn default_confirmation_timeout_ms() -> u64 {
    30_000
}

fn default_max_suggestions() -> usize {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            confirmation_timeout_ms: default_confirmation_timeout_ms(),
            max_suggestions: default_max_suggestions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_contract() {
        let config = EngineConfig::default();
        assert_eq!(config.confidence_threshold, 0.6);
        assert_eq!(config.confirmation_timeout_ms, 30_000);
        assert_eq!(config.max_suggestions, 3);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str("confidence_threshold = 0.75").unwrap();
        assert_eq!(config.confidence_threshold, 0.75);
        assert_eq!(config.confirmation_timeout_ms, 30_000);
    }
}
