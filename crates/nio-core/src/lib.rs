//! Nio Core - realtime audio/MIDI I/O for the synth engine
//!
//! Binds an [`Engine`](engine::Engine) to a host: a JACK server client, a
//! multi-channel OSS DSP device, or (in `nio-dssi`) a plugin host.

pub mod audio;
pub mod config;
pub mod engine;
pub mod types;

pub use types::*;
