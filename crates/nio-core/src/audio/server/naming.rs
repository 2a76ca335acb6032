//! Client name generation

use crate::audio::config::ServerConfig;

/// Base name of every generated client
pub const CLIENT_BASE_NAME: &str = "zynaddsubfx";

/// Digits the pid is zero padded to
const PID_WIDTH: usize = 5;

/// Client name for `config`
///
/// `zynaddsubfx[_<postfix>][_<pid>]`, or the instance name override verbatim.
/// The pid is zero padded to five digits; longer pids are kept whole.
pub fn client_name(config: &ServerConfig, pid: u32) -> String {
    if let Some(instance) = config.instance_name.as_deref().filter(|s| !s.is_empty()) {
        return instance.to_string();
    }

    let mut name = String::from(CLIENT_BASE_NAME);
    if let Some(postfix) = config.postfix.as_deref().filter(|s| !s.is_empty()) {
        name.push('_');
        name.push_str(postfix);
    }
    if config.pid_in_client_name {
        name.push_str(&format!("_{:0width$}", pid, width = PID_WIDTH));
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name() {
        assert_eq!(client_name(&ServerConfig::default(), 42), "zynaddsubfx");
    }

    #[test]
    fn test_postfix_and_pid() {
        let config = ServerConfig {
            postfix: Some("live".into()),
            pid_in_client_name: true,
            ..Default::default()
        };
        assert_eq!(client_name(&config, 42), "zynaddsubfx_live_00042");
    }

    #[test]
    fn test_long_pid_is_not_truncated() {
        let config = ServerConfig {
            pid_in_client_name: true,
            ..Default::default()
        };
        assert_eq!(
            client_name(&config, 4_194_303),
            "zynaddsubfx_4194303",
            "pids wider than the padding must be kept whole"
        );
    }

    #[test]
    fn test_instance_name_overrides_everything() {
        let config = ServerConfig {
            postfix: Some("live".into()),
            pid_in_client_name: true,
            instance_name: Some("my-synth".into()),
            ..Default::default()
        };
        assert_eq!(client_name(&config, 42), "my-synth");
    }
}
