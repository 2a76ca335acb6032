//! Backend configuration
//!
//! Sample rate, block size and compression shared by every backend, plus
//! the server client and DSP device settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE, MAX_BUFFER_SIZE};

/// Environment variable overriding [`DspConfig::device`]
pub const DSP_DEVICE_ENV: &str = "DSP_DEVICE";

/// Default OSS output device
pub const DEFAULT_DSP_DEVICE: &str = "/dev/dsp";

/// Audio server client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server to connect to (None or "default" = the default server)
    pub server_name: Option<String>,
    /// Appended to the client name as `_<postfix>`
    pub postfix: Option<String>,
    /// Append the zero-padded process id to the client name
    pub pid_in_client_name: bool,
    /// Use this exact client name instead of the generated one
    pub instance_name: Option<String>,
    /// Connect the outputs to the first physical playback ports on open
    pub autoconnect: bool,
    /// Let the client library start a server when none is running
    pub start_server: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: None,
            postfix: None,
            pid_in_client_name: false,
            instance_name: None,
            autoconnect: true,
            start_server: true,
        }
    }
}

impl ServerConfig {
    /// Server name to select, if it is not the default server
    ///
    /// An instance name override takes the client name verbatim and ignores
    /// the server selection.
    pub fn selected_server(&self) -> Option<&str> {
        if self.instance_name.is_some() {
            return None;
        }
        self.server_name
            .as_deref()
            .filter(|name| !name.is_empty() && *name != "default")
    }
}

/// DSP device settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DspConfig {
    /// Device path used when `DSP_DEVICE` is not set
    pub device: String,
}

impl Default for DspConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DSP_DEVICE.to_string(),
        }
    }
}

impl DspConfig {
    /// Device path to open, honouring the `DSP_DEVICE` override
    pub fn device_path(&self) -> PathBuf {
        match std::env::var_os(DSP_DEVICE_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from(&self.device),
        }
    }
}

/// Configuration for the I/O layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Engine sample rate (Hz)
    pub sample_rate: u32,
    /// Engine block size (frames); the server backend follows the server instead
    pub buffer_size: usize,
    /// Limit the output to [-1, +1]
    pub output_compression: bool,
    pub server: ServerConfig,
    pub dsp: DspConfig,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            output_compression: false,
            server: ServerConfig::default(),
            dsp: DspConfig::default(),
        }
    }
}

impl IoConfig {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_buffer_size(mut self, frames: usize) -> Self {
        self.buffer_size = frames;
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.output_compression = enabled;
        self
    }

    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }

    pub fn with_dsp_device(mut self, device: impl Into<String>) -> Self {
        self.dsp.device = device.into();
        self
    }

    /// Block size clamped to what the backends pre-allocate
    pub fn block_size(&self) -> usize {
        self.buffer_size.clamp(1, MAX_BUFFER_SIZE)
    }

    /// Block latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.block_size() as f32 / self.sample_rate.max(1) as f32) * 1000.0
    }
}
