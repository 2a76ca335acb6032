//! JACK binding of the server backend
//!
//! Ports use custom specs so the outputs and MIDI input are flagged
//! terminal and the OSC input carries its own port type. MIDI and OSC
//! buffers are read through the raw event API since the stock iterators are
//! tied to the stock port specs.

use std::mem::MaybeUninit;
use std::time::Duration;

use jack_sys as j;
use jack::{AsyncClient, Client, ClientOptions, Control, Frames, Port, PortFlags, PortSpec, ProcessScope};

use super::ports::{port_exchange, LivePorts, PortChange, PortReceiver, PortSender};
use super::process::{BlockIo, ServerProcessor};
use super::{
    ConnectFailure, PortLayout, ServerBackend, ServerClient, ServerConnector, AUDIO_OUT_LEFT,
    AUDIO_OUT_RIGHT, MIDI_IN, OSC_IN,
};
use crate::audio::config::ServerConfig;
use crate::audio::error::{AudioError, AudioResult};
use crate::engine::Engine;

/// Server backend on JACK
pub type JackBackend<E> = ServerBackend<E, JackConnector>;

/// Environment variable libjack reads to pick the server
const SERVER_NAME_ENV: &str = "JACK_DEFAULT_SERVER";

const AUDIO_PORT_TYPE: &str = "32 bit float mono audio";
const MIDI_PORT_TYPE: &str = "8 bit raw midi";

/// Port type of the OSC input
const OSC_PORT_TYPE: &str = "8 bit raw OSC";

#[cfg(feature = "metadata")]
const EVENT_TYPES_KEY: &str = "http://jackaudio.org/metadata/event-types";

#[cfg(feature = "metadata")]
const EVENT_TYPE_OSC: &str = "OSC";

// ═══════════════════════════════════════════════════════════════════════════════
// Port specs
// ═══════════════════════════════════════════════════════════════════════════════

/// Audio output that is an end point of the graph
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalAudioOut;

unsafe impl PortSpec for TerminalAudioOut {
    fn jack_port_type(&self) -> &str {
        AUDIO_PORT_TYPE
    }

    fn jack_flags(&self) -> PortFlags {
        PortFlags::IS_OUTPUT | PortFlags::IS_TERMINAL
    }

    fn jack_buffer_size(&self) -> libc::c_ulong {
        0
    }
}

/// MIDI input that is an end point of the graph
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalMidiIn;

unsafe impl PortSpec for TerminalMidiIn {
    fn jack_port_type(&self) -> &str {
        MIDI_PORT_TYPE
    }

    fn jack_flags(&self) -> PortFlags {
        PortFlags::IS_INPUT | PortFlags::IS_TERMINAL
    }

    fn jack_buffer_size(&self) -> libc::c_ulong {
        0
    }
}

/// OSC event input
#[derive(Debug, Default, Clone, Copy)]
pub struct OscIn;

unsafe impl PortSpec for OscIn {
    fn jack_port_type(&self) -> &str {
        OSC_PORT_TYPE
    }

    fn jack_flags(&self) -> PortFlags {
        PortFlags::IS_INPUT
    }

    fn jack_buffer_size(&self) -> libc::c_ulong {
        0
    }
}

/// Audio outputs plus the OSC input that travels with them
struct AudioPorts {
    left: Port<TerminalAudioOut>,
    right: Port<TerminalAudioOut>,
    osc: Option<Port<OscIn>>,
}

type MidiPort = Port<TerminalMidiIn>;
type JackPorts = LivePorts<AudioPorts, MidiPort>;
type JackPortChange = PortChange<AudioPorts, MidiPort>;

/// How long a layout change waits for the process thread
const HANDOFF_TIMEOUT: Duration = Duration::from_secs(2);

fn register<PS: PortSpec>(client: &Client, name: &str, spec: PS) -> AudioResult<Port<PS>> {
    client
        .register_port(name, spec)
        .map_err(|e| AudioError::PortRegistration {
            port: name.to_string(),
            reason: e.to_string(),
        })
}

fn unregister<PS: PortSpec>(client: &Client, port: Port<PS>) -> AudioResult<()> {
    let name = port.name().unwrap_or_default();
    client
        .unregister_port(port)
        .map_err(|e| AudioError::PortUnregistration {
            port: name,
            reason: e.to_string(),
        })
}

#[cfg(feature = "metadata")]
fn tag_osc_port(client: &Client, port: &Port<OscIn>) {
    let uuid = unsafe { j::jack_port_uuid(port.raw()) };
    let property = jack::Property::new(EVENT_TYPE_OSC, Some("text/plain".to_string()));
    if let Err(e) = client.property_set(uuid, EVENT_TYPES_KEY, &property) {
        log::warn!("Failed to tag OSC port: {}", e);
    }
}

#[cfg(not(feature = "metadata"))]
fn tag_osc_port(_client: &Client, _port: &Port<OscIn>) {}

#[cfg(feature = "metadata")]
fn untag_osc_port(client: &Client, port: &Port<OscIn>) {
    let uuid = unsafe { j::jack_port_uuid(port.raw()) };
    if let Err(e) = client.property_remove(uuid, EVENT_TYPES_KEY) {
        log::debug!("Failed to remove OSC port metadata: {}", e);
    }
}

#[cfg(not(feature = "metadata"))]
fn untag_osc_port(_client: &Client, _port: &Port<OscIn>) {}

fn register_audio(client: &Client) -> AudioResult<AudioPorts> {
    let left = register(client, AUDIO_OUT_LEFT, TerminalAudioOut)?;
    let right = match register(client, AUDIO_OUT_RIGHT, TerminalAudioOut) {
        Ok(right) => right,
        Err(e) => {
            if let Err(cleanup) = unregister(client, left) {
                log::warn!("{}", cleanup);
            }
            return Err(e);
        }
    };

    let osc = match register(client, OSC_IN, OscIn) {
        Ok(osc) => {
            tag_osc_port(client, &osc);
            Some(osc)
        }
        Err(e) => {
            log::warn!("OSC input unavailable: {}", e);
            None
        }
    };
    Ok(AudioPorts { left, right, osc })
}

/// Unregister whatever `change` carries
fn release(client: &Client, change: JackPortChange) -> AudioResult<()> {
    match change {
        PortChange::Audio(Some(AudioPorts { left, right, osc })) => {
            let mut result = unregister(client, left).and(unregister(client, right));
            if let Some(osc) = osc {
                untag_osc_port(client, &osc);
                result = result.and(unregister(client, osc));
            }
            result
        }
        PortChange::Midi(Some(midi)) => unregister(client, midi),
        PortChange::Audio(None) | PortChange::Midi(None) => Ok(()),
    }
}

/// Queue `change` for the process thread
fn send(
    client: &Client,
    sender: &mut PortSender<AudioPorts, MidiPort>,
    change: JackPortChange,
) -> AudioResult<()> {
    match sender.send(change) {
        Ok(()) => Ok(()),
        Err(change) => release(client, change)
            .and(Err(AudioError::Activation("port handoff queue is full".into()))),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Process handler
// ═══════════════════════════════════════════════════════════════════════════════

/// Visit every event in a MIDI-style port buffer
///
/// # Safety
///
/// Must be called from the process callback of the client owning `port`.
unsafe fn for_each_event<PS: PortSpec>(
    port: &Port<PS>,
    ps: &ProcessScope,
    f: &mut dyn FnMut(u32, &[u8]),
) {
    let buffer = port.buffer(ps.n_frames());
    if buffer.is_null() {
        return;
    }
    let count = j::jack_midi_get_event_count(buffer);
    for index in 0..count {
        let mut event = MaybeUninit::<j::jack_midi_event_t>::uninit();
        if j::jack_midi_event_get(event.as_mut_ptr(), buffer, index) != 0 {
            continue;
        }
        let event = event.assume_init();
        if event.buffer.is_null() {
            continue;
        }
        let bytes = std::slice::from_raw_parts(event.buffer as *const u8, event.size);
        f(event.time, bytes);
    }
}

/// Port buffers of one JACK cycle
struct JackBlock<'a> {
    ports: &'a JackPorts,
    ps: &'a ProcessScope,
}

impl BlockIo for JackBlock<'_> {
    fn frames(&self) -> usize {
        self.ps.n_frames() as usize
    }

    fn for_each_midi(&mut self, f: &mut dyn FnMut(u32, &[u8])) {
        if let Some(port) = &self.ports.midi {
            unsafe { for_each_event(port, self.ps, f) }
        }
    }

    fn for_each_osc(&mut self, f: &mut dyn FnMut(&[u8])) {
        if let Some(port) = self.ports.audio.as_ref().and_then(|a| a.osc.as_ref()) {
            unsafe { for_each_event(port, self.ps, &mut |_, packet| f(packet)) }
        }
    }

    fn has_outputs(&self) -> bool {
        self.ports.audio.is_some()
    }

    fn outputs(&mut self) -> Option<(&mut [f32], &mut [f32])> {
        let audio = self.ports.audio.as_ref()?;
        let n = self.ps.n_frames();
        let (l, r) = unsafe { (audio.left.buffer(n) as *mut f32, audio.right.buffer(n) as *mut f32) };
        if l.is_null() || r.is_null() {
            return None;
        }
        // Distinct ports, buffers valid for this cycle only
        unsafe {
            Some((
                std::slice::from_raw_parts_mut(l, n as usize),
                std::slice::from_raw_parts_mut(r, n as usize),
            ))
        }
    }
}

/// JACK process handler
///
/// Owns the processor (and through it the engine) while active. The
/// processor arrives through `inbox` right after activation so a failed
/// activation never takes it down. Ports arrive through `ports`.
struct JackProcessor<E> {
    core: Option<ServerProcessor<E>>,
    inbox: rtrb::Consumer<ServerProcessor<E>>,
    ports: PortReceiver<AudioPorts, MidiPort>,
}

impl<E: Engine> JackProcessor<E> {
    fn receive(&mut self) {
        if self.core.is_none() {
            self.core = self.inbox.pop().ok();
        }
    }

    /// Processor and ports, once the client is deactivated
    fn into_parts(mut self) -> (Option<ServerProcessor<E>>, PortReceiver<AudioPorts, MidiPort>) {
        self.receive();
        (self.core, self.ports)
    }
}

impl<E: Engine> jack::ProcessHandler for JackProcessor<E> {
    fn process(&mut self, _client: &Client, ps: &ProcessScope) -> Control {
        self.receive();
        let ports = self.ports.update();
        let Some(core) = self.core.as_mut() else {
            return Control::Continue;
        };

        let mut block = JackBlock { ports, ps };
        match core.process(&mut block) {
            Ok(()) => Control::Continue,
            Err(_) => Control::Quit,
        }
    }

    fn buffer_size(&mut self, _client: &Client, size: Frames) -> Control {
        self.receive();
        if let Some(core) = self.core.as_mut() {
            core.set_buffer_size(size as usize);
        }
        Control::Continue
    }
}

/// JACK notification handler
struct JackNotifications;

impl jack::NotificationHandler for JackNotifications {
    fn shutdown(&mut self, _status: jack::ClientStatus, reason: &str) {
        log::error!("JACK server shut down the client: {}", reason);
    }

    fn sample_rate(&mut self, _client: &Client, srate: Frames) -> Control {
        log::info!("JACK sample rate changed to: {}", srate);
        Control::Continue
    }

    fn xrun(&mut self, _client: &Client) -> Control {
        log::warn!("JACK xrun detected");
        Control::Continue
    }
}

type ActiveClient<E> = AsyncClient<JackNotifications, JackProcessor<E>>;

/// Activate `client`, then hand `core` to the process thread
fn activate<E: Engine>(
    client: Client,
    ports: PortReceiver<AudioPorts, MidiPort>,
    core: ServerProcessor<E>,
) -> Result<ActiveClient<E>, (AudioError, ServerProcessor<E>)> {
    let (mut outbox, inbox) = rtrb::RingBuffer::new(1);
    let processor = JackProcessor {
        core: None,
        inbox,
        ports,
    };

    let active = match client.activate_async(JackNotifications, processor) {
        Ok(active) => active,
        Err(e) => return Err((AudioError::Activation(e.to_string()), core)),
    };
    match outbox.push(core) {
        Ok(()) => Ok(active),
        Err(rtrb::PushError::Full(core)) => {
            Err((AudioError::Activation("processor handoff failed".into()), core))
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Client
// ═══════════════════════════════════════════════════════════════════════════════

/// Options for opening a client under `config`
fn client_options(config: &ServerConfig) -> ClientOptions {
    if config.start_server {
        ClientOptions::empty()
    } else {
        ClientOptions::NO_START_SERVER
    }
}

/// Opens [`JackClient`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct JackConnector;

impl<E: Engine> ServerConnector<E> for JackConnector {
    type Client = JackClient<E>;

    fn connect(
        &mut self,
        name: &str,
        config: &ServerConfig,
        mut processor: ServerProcessor<E>,
    ) -> Result<JackClient<E>, ConnectFailure<E>> {
        if let Some(server) = config.selected_server() {
            std::env::set_var(SERVER_NAME_ENV, server);
        }

        let client = match Client::new(name, client_options(config)) {
            Ok((client, _status)) => client,
            Err(e) => {
                let error = AudioError::ClientOpen {
                    name: name.to_string(),
                    reason: e.to_string(),
                };
                return Err(ConnectFailure::new(error, processor));
            }
        };

        let name = client.name().to_string();
        let sample_rate = client.sample_rate() as u32;
        processor.renderer_mut().set_sample_rate(sample_rate);
        processor.set_buffer_size(client.buffer_size() as usize);

        let (ports, receiver) = port_exchange();
        match activate(client, receiver, processor) {
            Ok(active) => Ok(JackClient {
                name,
                sample_rate,
                active: Some(active),
                layout: PortLayout::NONE,
                ports,
            }),
            Err((error, processor)) => Err(ConnectFailure::new(error, processor)),
        }
    }
}

/// An activated JACK client
///
/// Stays active until closed. Ports are registered and unregistered on the
/// running client and handed to the process thread through `ports`.
pub struct JackClient<E: Engine> {
    name: String,
    sample_rate: u32,
    active: Option<ActiveClient<E>>,
    layout: PortLayout,
    ports: PortSender<AudioPorts, MidiPort>,
}

impl<E: Engine> ServerClient<E> for JackClient<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn buffer_size(&self) -> usize {
        self.active
            .as_ref()
            .map(|a| a.as_client().buffer_size() as usize)
            .unwrap_or(0)
    }

    fn layout(&self) -> PortLayout {
        self.layout
    }

    fn set_layout(&mut self, layout: PortLayout) -> AudioResult<()> {
        if layout == self.layout {
            return Ok(());
        }
        let Some(active) = &self.active else {
            return Err(AudioError::Activation("client is no longer active".into()));
        };
        let client = active.as_client();
        let mut result = Ok(());

        if layout.audio != self.layout.audio {
            let change = if layout.audio {
                register_audio(client).map(|ports| PortChange::Audio(Some(ports)))
            } else {
                Ok(PortChange::Audio(None))
            };
            match change.and_then(|change| send(client, &mut self.ports, change)) {
                Ok(()) => self.layout.audio = layout.audio,
                Err(e) => result = Err(e),
            }
        }

        if layout.midi != self.layout.midi {
            let change = if layout.midi {
                register(client, MIDI_IN, TerminalMidiIn).map(|port| PortChange::Midi(Some(port)))
            } else {
                Ok(PortChange::Midi(None))
            };
            match change.and_then(|change| send(client, &mut self.ports, change)) {
                Ok(()) => self.layout.midi = layout.midi,
                Err(e) => result = result.and(Err(e)),
            }
        }

        let mut released = Ok(());
        let settled = self.ports.settle(HANDOFF_TIMEOUT, |old| {
            if let Err(e) = release(client, old) {
                released = std::mem::replace(&mut released, Ok(())).and(Err(e));
            }
        });
        if !settled {
            log::warn!(
                "Process thread of '{}' has not picked up the port change yet",
                self.name
            );
        }
        result.and(released)
    }

    fn connect_outputs(&self) -> AudioResult<()> {
        let Some(active) = &self.active else {
            return Ok(());
        };
        let client = active.as_client();

        let physical = client.ports(
            None,
            Some(AUDIO_PORT_TYPE),
            PortFlags::IS_PHYSICAL | PortFlags::IS_INPUT,
        );
        if physical.len() < 2 {
            log::warn!("No physical outputs to autoconnect to");
            return Ok(());
        }

        for (own, target) in [(AUDIO_OUT_LEFT, &physical[0]), (AUDIO_OUT_RIGHT, &physical[1])] {
            let own = format!("{}:{}", self.name, own);
            client
                .connect_ports_by_name(&own, target)
                .map_err(|e| AudioError::Connection(format!("{} -> {}: {}", own, target, e)))?;
            log::info!("Connected {} to {}", own, target);
        }
        Ok(())
    }

    fn close(mut self) -> Option<ServerProcessor<E>> {
        let active = self.active.take()?;
        match active.deactivate() {
            Ok((client, _notifications, processor)) => {
                let (core, receiver) = processor.into_parts();
                for held in receiver.drain().into_iter().chain(self.ports.drain()) {
                    if let Err(e) = release(&client, held) {
                        log::warn!("Closing '{}': {}", self.name, e);
                    }
                }
                core
            }
            Err(e) => {
                log::error!("Failed to deactivate JACK client '{}': {}", self.name, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_may_start_a_server() {
        let options = client_options(&ServerConfig::default());
        assert!(
            !options.contains(ClientOptions::NO_START_SERVER),
            "a missing server is started by default"
        );
    }

    #[test]
    fn test_server_start_can_be_disabled() {
        let config = ServerConfig {
            start_server: false,
            ..Default::default()
        };
        assert!(client_options(&config).contains(ClientOptions::NO_START_SERVER));
    }
}
