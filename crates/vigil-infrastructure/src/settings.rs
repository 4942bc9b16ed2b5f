//! Engine configuration loading.
//!
//! The engine's tuning parameters live in `~/.vigil/config.toml`. A
//! missing file yields the defaults; a malformed file is an error the
//! caller surfaces, not something to paper over.

use std::fs;
use std::path::{Path, PathBuf};
use vigil_core::error::{Result, VigilError};
use vigil_core::EngineConfig;

/// Default configuration file path (`~/.vigil/config.toml`).
pub fn default_config_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| VigilError::config("could not determine home directory"))?;
    Ok(home_dir.join(".vigil").join("config.toml"))
}

/// Loads the engine configuration from a TOML file.
///
/// # Errors
///
/// Returns a serialization error for malformed TOML; a missing file is
/// not an error and yields `EngineConfig::default()`.
pub fn load(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(EngineConfig::default());
    }
    let raw = fs::read_to_string(path)?;
    let config = toml::from_str(&raw)?;
    Ok(config)
}

/// Loads from the default location.
pub fn load_default() -> Result<EngineConfig> {
    load(default_config_path()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(dir.path().join("config.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn file_overrides_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "confidence_threshold = 0.8\nmax_suggestions = 5\n").unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.confidence_threshold, 0.8);
        assert_eq!(config.max_suggestions, 5);
        assert_eq!(config.confirmation_timeout_ms, 30_000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "confidence_threshold = \"loud\"").unwrap();
        assert!(load(&path).is_err());
    }
}
