//! Audio server backend
//!
//! A client of a professional audio server (JACK) with two terminal audio
//! outputs, an OSC input and a terminal MIDI input.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  open/close  ┌──────────────────────┐
//! │  ServerBackend   │─────────────►│  ServerClient        │
//! │ (control thread) │              │  (JACK client, ports)│
//! └──────────────────┘              └──────────┬───────────┘
//!         ▲                                    │ process()
//!         │ engine handed back on close        ▼
//!         │                         ┌──────────────────────┐
//!         └─────────────────────────│  ServerProcessor     │
//!                                   │  (server RT thread,  │
//!                                   │   owns the engine)   │
//!                                   └──────────────────────┘
//! ```
//!
//! Audio and MIDI open independently. The first one opened connects the
//! client, the last one closed disconnects it. Ports are registered on the
//! running client and reach the process thread through a [`PortSender`];
//! ports it replaces come back before they are unregistered.

#[cfg(all(target_os = "linux", feature = "jack-backend"))]
mod jack;
mod naming;
mod ports;
mod process;

#[cfg(all(target_os = "linux", feature = "jack-backend"))]
pub use self::jack::{JackBackend, JackClient, JackConnector};
pub use naming::{client_name, CLIENT_BASE_NAME};
pub use ports::{port_exchange, LivePorts, PortChange, PortReceiver, PortSender};
pub use process::{is_osc_message, BlockIo, ProcessError, ServerProcessor};

use super::config::{IoConfig, ServerConfig};
use super::error::{AudioError, AudioResult};
use super::out::{AudioOut, Compression, Renderer};
use crate::engine::Engine;

/// Left audio output port
pub const AUDIO_OUT_LEFT: &str = "out_1";
/// Right audio output port
pub const AUDIO_OUT_RIGHT: &str = "out_2";
/// OSC input port, registered together with the audio outputs
pub const OSC_IN: &str = "osc";
/// MIDI input port
pub const MIDI_IN: &str = "midi_input";

/// Which port groups a client currently exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortLayout {
    /// `out_1`, `out_2` and `osc`
    pub audio: bool,
    /// `midi_input`
    pub midi: bool,
}

impl PortLayout {
    pub const NONE: PortLayout = PortLayout {
        audio: false,
        midi: false,
    };

    pub fn is_empty(&self) -> bool {
        !self.audio && !self.midi
    }

    /// Short port names for this layout
    pub fn port_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.audio {
            names.extend([AUDIO_OUT_LEFT, AUDIO_OUT_RIGHT, OSC_IN]);
        }
        if self.midi {
            names.push(MIDI_IN);
        }
        names
    }
}

/// A connected, active server client
pub trait ServerClient<E: Engine> {
    /// Name the server assigned to the client
    fn name(&self) -> &str;

    fn sample_rate(&self) -> u32;

    /// Current server block size (frames)
    fn buffer_size(&self) -> usize;

    /// Ports currently registered
    fn layout(&self) -> PortLayout;

    /// Register / unregister ports until `layout` is exposed
    ///
    /// Audio and MIDI change independently and the client stays active, so
    /// a group that is not changing keeps running. After a failure
    /// [`layout`](ServerClient::layout) reports what is still registered.
    fn set_layout(&mut self, layout: PortLayout) -> AudioResult<()>;

    /// Connect the audio outputs to the first two physical playback ports
    fn connect_outputs(&self) -> AudioResult<()>;

    /// Deactivate and close, handing back the processor
    ///
    /// `None` means the processor was lost with a client that failed to
    /// deactivate.
    fn close(self) -> Option<ServerProcessor<E>>
    where
        Self: Sized;
}

/// Failed connection attempt; the processor comes back when it survived
pub struct ConnectFailure<E> {
    pub error: AudioError,
    pub processor: Option<ServerProcessor<E>>,
}

impl<E> ConnectFailure<E> {
    pub fn new(error: AudioError, processor: ServerProcessor<E>) -> Self {
        Self {
            error,
            processor: Some(processor),
        }
    }
}

/// Opens clients on a particular server implementation
pub trait ServerConnector<E: Engine> {
    type Client: ServerClient<E>;

    /// Open and activate a client with no ports, running `processor`
    fn connect(
        &mut self,
        name: &str,
        config: &ServerConfig,
        processor: ServerProcessor<E>,
    ) -> Result<Self::Client, ConnectFailure<E>>;
}

enum Connection<E, C> {
    /// Not connected; the backend holds the processor
    Idle(ServerProcessor<E>),
    /// Connected; the client's RT thread holds the processor
    Active(C),
    /// The processor went down with a failed client
    Lost,
}

/// [`AudioOut`] for an audio server
pub struct ServerBackend<E: Engine, K: ServerConnector<E>> {
    connector: K,
    config: ServerConfig,
    name: String,
    connection: Connection<E, K::Client>,
    audio: bool,
    midi: bool,
    sample_rate: u32,
}

impl<E: Engine, K: ServerConnector<E>> ServerBackend<E, K> {
    pub fn new(engine: E, config: &IoConfig, compression: Compression, connector: K) -> Self {
        let renderer = Renderer::new(engine, config.sample_rate, config.block_size(), compression);
        Self {
            connector,
            name: client_name(&config.server, std::process::id()),
            config: config.server.clone(),
            connection: Connection::Idle(ServerProcessor::new(renderer)),
            audio: false,
            midi: false,
            sample_rate: config.sample_rate,
        }
    }

    /// Requested client name
    pub fn client_name(&self) -> &str {
        &self.name
    }

    /// Whether a client is currently connected
    pub fn is_connected(&self) -> bool {
        matches!(self.connection, Connection::Active(_))
    }

    pub fn client(&self) -> Option<&K::Client> {
        match &self.connection {
            Connection::Active(client) => Some(client),
            _ => None,
        }
    }

    /// Stop both subsystems and take the engine back
    pub fn into_engine(mut self) -> Option<E> {
        self.stop();
        match std::mem::replace(&mut self.connection, Connection::Lost) {
            Connection::Idle(processor) => Some(processor.into_renderer().into_engine()),
            _ => None,
        }
    }

    fn connect(&mut self) -> AudioResult<()> {
        match std::mem::replace(&mut self.connection, Connection::Lost) {
            Connection::Active(client) => {
                self.connection = Connection::Active(client);
                Ok(())
            }
            Connection::Idle(processor) => {
                match self.connector.connect(&self.name, &self.config, processor) {
                    Ok(client) => {
                        log::info!(
                            "Server client '{}' connected (sample rate: {}Hz, buffer: {} frames)",
                            client.name(),
                            client.sample_rate(),
                            client.buffer_size()
                        );
                        self.sample_rate = client.sample_rate();
                        self.connection = Connection::Active(client);
                        Ok(())
                    }
                    Err(failure) => {
                        log::error!("Failed to connect to audio server: {}", failure.error);
                        self.connection = match failure.processor {
                            Some(processor) => Connection::Idle(processor),
                            None => Connection::Lost,
                        };
                        Err(failure.error)
                    }
                }
            }
            Connection::Lost => Err(AudioError::EngineLost),
        }
    }

    fn disconnect(&mut self) {
        if let Connection::Active(client) = std::mem::replace(&mut self.connection, Connection::Lost) {
            let name = client.name().to_string();
            self.connection = match client.close() {
                Some(processor) => {
                    log::info!("Server client '{}' closed", name);
                    Connection::Idle(processor)
                }
                None => {
                    log::error!("Server client '{}' failed to close, engine lost", name);
                    Connection::Lost
                }
            };
        }
    }

    /// Move to `layout`, connecting first and disconnecting when empty
    fn apply_layout(&mut self, layout: PortLayout) -> AudioResult<()> {
        if !layout.is_empty() {
            self.connect()?;
        }

        let result = match &mut self.connection {
            Connection::Active(client) => client.set_layout(layout),
            _ => Ok(()),
        };

        let actual = self.client().map(|c| c.layout()).unwrap_or_default();
        self.audio = actual.audio;
        self.midi = actual.midi;
        if actual.is_empty() {
            self.disconnect();
        }
        result
    }
}

impl<E: Engine, K: ServerConnector<E>> AudioOut for ServerBackend<E, K> {
    fn name(&self) -> &'static str {
        "JACK"
    }

    fn open_audio(&mut self) -> AudioResult<()> {
        if self.audio {
            return Ok(());
        }
        self.apply_layout(PortLayout {
            audio: true,
            midi: self.midi,
        })?;

        if self.config.autoconnect {
            if let Some(Err(e)) = self.client().map(|c| c.connect_outputs()) {
                log::warn!("Auto-connect failed: {}", e);
            }
        }
        Ok(())
    }

    fn close_audio(&mut self) {
        if !self.audio {
            return;
        }
        if let Err(e) = self.apply_layout(PortLayout {
            audio: false,
            midi: self.midi,
        }) {
            log::warn!("Failed to close audio ports: {}", e);
        }
    }

    fn audio_enabled(&self) -> bool {
        self.audio
    }

    fn open_midi(&mut self) -> AudioResult<()> {
        if self.midi {
            return Ok(());
        }
        self.apply_layout(PortLayout {
            audio: self.audio,
            midi: true,
        })
    }

    fn close_midi(&mut self) {
        if !self.midi {
            return;
        }
        if let Err(e) = self.apply_layout(PortLayout {
            audio: self.audio,
            midi: false,
        }) {
            log::warn!("Failed to close MIDI port: {}", e);
        }
    }

    fn midi_enabled(&self) -> bool {
        self.midi
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn buffer_size(&self) -> usize {
        match &self.connection {
            Connection::Active(client) => client.buffer_size(),
            Connection::Idle(processor) => processor.renderer().block_size(),
            Connection::Lost => 0,
        }
    }
}

impl<E: Engine, K: ServerConnector<E>> Drop for ServerBackend<E, K> {
    fn drop(&mut self) {
        self.close_midi();
        self.close_audio();
        // Ports that failed to unregister go away with the client
        self.disconnect();
    }
}
