//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while opening or driving a backend
#[derive(Error, Debug)]
pub enum AudioError {
    /// Could not open a client on the audio server
    #[error("Failed to open server client '{name}': {reason}")]
    ClientOpen { name: String, reason: String },

    /// Could not register a port
    #[error("Failed to register port '{port}': {reason}")]
    PortRegistration { port: String, reason: String },

    /// Could not unregister a port
    #[error("Failed to unregister port '{port}': {reason}")]
    PortUnregistration { port: String, reason: String },

    /// Could not (re)activate the server client
    #[error("Failed to activate server client: {0}")]
    Activation(String),

    /// Could not connect ports
    #[error("Failed to connect ports: {0}")]
    Connection(String),

    /// Could not open the DSP device
    #[error("Failed to open DSP device {path}: {source}")]
    DeviceOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The device accepts neither 32-bit nor 16-bit signed samples
    #[error("DSP device supports no usable sample format")]
    FormatUnsupported,

    /// The device refused every stereo channel count
    #[error("DSP device supports no usable channel count")]
    ChannelsUnsupported,

    /// The device runs at a different rate than the engine
    #[error("Sample rate mismatch: requested={requested}Hz, device={actual}Hz")]
    SampleRateMismatch { requested: u32, actual: u32 },

    /// Failed to spawn the audio thread
    #[error("Failed to spawn audio thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// The engine was lost with a client that failed to shut down
    #[error("Engine is no longer available")]
    EngineLost,

    /// Device I/O failure
    #[error("Audio I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
