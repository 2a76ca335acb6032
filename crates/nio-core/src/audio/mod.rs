//! Audio and MIDI backends for the synth engine
//!
//! Every backend implements [`AudioOut`] and drives its engine through a
//! [`Renderer`]:
//! - **Server** ([`ServerBackend`]): a client of an audio server with stereo
//!   outputs, a MIDI input and an OSC input, driven by the server's process
//!   callback (JACK on Linux with the `jack-backend` feature)
//! - **Multi-device** ([`MultiDeviceBackend`]): one stereo pair per synth part
//!   on a kernel DSP device, written from a backend-owned thread (OSS on Unix)
//!
//! # Example Usage
//!
//! ```ignore
//! use nio_core::audio::{AudioOut, Compression, IoConfig, JackBackend, JackConnector};
//!
//! let config = IoConfig::default().with_compression(true);
//! let mut backend = JackBackend::new(engine, &config, Compression::new(true), JackConnector);
//! backend.start()?;
//! // ...
//! backend.stop();
//! ```

mod compressor;
mod config;
mod error;
mod multi;
mod out;
pub mod server;

pub use compressor::{stereo_compressor, PeakBank};
pub use config::{DspConfig, IoConfig, ServerConfig, DEFAULT_DSP_DEVICE, DSP_DEVICE_ENV};
pub use error::{AudioError, AudioResult};
pub use multi::{
    negotiate, DspDevice, DspDriver, MultiDeviceBackend, SampleFormat, StreamFormat,
};
#[cfg(unix)]
pub use multi::{OssBackend, OssDevice, OssDriver};
pub use out::{AudioOut, Compression, Renderer};
pub use server::{client_name, PortLayout, ServerBackend, ServerClient, ServerConnector};

#[cfg(all(target_os = "linux", feature = "jack-backend"))]
pub use server::{JackBackend, JackConnector};
