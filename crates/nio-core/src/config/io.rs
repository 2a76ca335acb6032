//! YAML persistence for any serde settings type

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Read settings from a YAML file
///
/// Unlike [`load_or_default`] this reports a missing or malformed file.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse config: {:?}", path))
}

/// Read settings, falling back to `T::default()` on any failure
pub fn load_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("No config at {:?}, using defaults", path);
        return T::default();
    }

    match load_config(path) {
        Ok(config) => {
            log::info!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("{:#}, using defaults", e);
            T::default()
        }
    }
}

/// Write settings as YAML, creating parent directories as needed
pub fn save_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::debug!("Saved config to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::IoConfig;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config: IoConfig = load_or_default(&dir.path().join("absent.yaml"));
        assert_eq!(config, IoConfig::default());
        assert!(load_config::<IoConfig>(&dir.path().join("absent.yaml")).is_err());
    }

    #[test]
    fn test_save_then_load_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("nio.yaml");

        let config = IoConfig::default()
            .with_sample_rate(96000)
            .with_buffer_size(128)
            .with_compression(true)
            .with_dsp_device("/dev/dsp3");
        save_config(&config, &path).unwrap();

        let loaded: IoConfig = load_config(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nio.yaml");
        std::fs::write(&path, "sample_rate: [not, a, number]").unwrap();

        let config: IoConfig = load_or_default(&path);
        assert_eq!(config, IoConfig::default());
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nio.yaml");
        std::fs::write(&path, "buffer_size: 64\n").unwrap();

        let config: IoConfig = load_or_default(&path);
        assert_eq!(config.buffer_size, 64);
        assert_eq!(config.sample_rate, IoConfig::default().sample_rate);
    }
}
