//! Layered configuration loading.
//!
//! Sources, lowest priority first: built-in [`FarmConfig`] defaults, a TOML
//! or JSON file, then `XFARM_*` environment variables (nested keys use `__`,
//! e.g. `XFARM_NORMAL_TERMS__PERIOD=80`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use xfarm_farm::FarmConfig;

/// Default config file: `<config dir>/xfarm/farm.toml`, used only if present.
fn default_path() -> Option<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("xfarm").join("farm.toml"))
        .filter(|p| p.exists())
}

/// Load and validate the farm configuration.
pub fn load(path: Option<&Path>) -> Result<FarmConfig> {
    let file = path.map(Path::to_path_buf).or_else(default_path);
    let mut builder = Config::builder();
    if let Some(file) = &file {
        builder = builder.add_source(File::from(file.as_path()).required(true));
    }
    builder = builder.add_source(
        Environment::with_prefix("XFARM")
            .separator("__")
            .try_parsing(true),
    );

    let config: FarmConfig = builder
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Invalid configuration")?;
    config.validate().context("Configuration rejected")?;

    tracing::debug!(file = ?file, start = config.start_height, "configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use xfarm_core::types::AccountId;

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("farm.toml");
        fs::write(
            &path,
            r#"
admin = "ops"
start_height = 500
first_deposit_bonus = "0"

[voting_terms]
period = 3600
unlock_ratio = 2000000
"#,
        )
        .unwrap();

        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.admin, AccountId::derive(b"ops"));
        assert_eq!(cfg.start_height, 500);
        assert_eq!(cfg.first_deposit_bonus, 0);
        assert_eq!(cfg.voting_terms.period, 3600);
        assert_eq!(cfg.normal_terms, FarmConfig::default().normal_terms);
        assert_eq!(cfg.stages, FarmConfig::default().stages);
    }

    #[test]
    fn json_stage_table_with_large_rates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("farm.json");
        fs::write(
            &path,
            r#"{
                "stage_interval": 100,
                "stages": [
                    { "until": 100, "reward_per_block": "500000000000000000000" },
                    { "until": 300, "reward_per_block": "1" }
                ]
            }"#,
        )
        .unwrap();

        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.stages.len(), 2);
        assert_eq!(cfg.stages[0].reward_per_block, 500_000_000_000_000_000_000);
    }

    #[test]
    fn invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("farm.toml");
        fs::write(&path, "stage_interval = 7\n").unwrap();
        assert!(load(Some(&path)).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
