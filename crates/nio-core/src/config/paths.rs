//! Standard locations of configuration files

use std::path::PathBuf;

/// File name of the I/O settings
pub const CONFIG_FILE: &str = "nio.yaml";

/// Per-user settings directory
///
/// `$XDG_CONFIG_HOME/zynaddsubfx` on Linux, or `./zynaddsubfx` when the
/// platform reports no config directory.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("zynaddsubfx")
}

/// Path of `filename` inside [`config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    config_dir().join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_is_application_specific() {
        assert!(config_dir().ends_with("zynaddsubfx"));
    }

    #[test]
    fn test_default_config_path_appends_filename() {
        let path = default_config_path(CONFIG_FILE);
        assert!(path.ends_with(CONFIG_FILE));
        assert_eq!(path.parent(), Some(config_dir().as_path()));
    }
}
