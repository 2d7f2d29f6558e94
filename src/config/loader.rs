//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::EngineConfig;
use crate::common::errors::{EngineError, Result};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with APP__, e.g. `APP__REFRESH__COOLDOWN_MS`)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<EngineConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| EngineError::Configuration(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("position_engine_{}_{}.toml", name, std::process::id()))
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = temp_file("config");
        std::fs::write(
            &path,
            r#"
[refresh]
cooldown_ms = 15000

[cache]
directory = "/var/lib/positions"

[collateral]
decimals = 18
symbol = "DAI"
"#,
        )
        .unwrap();

        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.refresh.cooldown_ms, 15_000);
        assert_eq!(config.refresh.read_timeout_ms, 10_000);
        assert_eq!(config.cache.directory, PathBuf::from("/var/lib/positions"));
        assert_eq!(config.collateral.decimals, 18);
        assert_eq!(config.collateral.symbol, "DAI");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config(Some("/nonexistent/position-engine.toml")).unwrap();
        assert_eq!(config.collateral.decimals, 6);
    }

    #[test]
    fn test_malformed_file_is_configuration_error() {
        let path = temp_file("malformed");
        std::fs::write(&path, "[refresh]\ncooldown_ms = \"soon\"\n").unwrap();

        let err = load_config(path.to_str()).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));

        let _ = std::fs::remove_file(&path);
    }
}
