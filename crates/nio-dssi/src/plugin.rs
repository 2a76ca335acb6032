//! One hosted synth instance
//!
//! A run is split at event timestamps: the synth renders up to the next
//! event's frame, the events at that frame are applied, and rendering
//! resumes from there. Events are expected in time order, as DSSI requires.

use std::ffi::{c_int, CString};
use std::sync::Arc;

use crate::catalog::{ProgramCatalog, ProgramEntry, BANK_SIZE};
use crate::controls::{ControlPorts, MAX_DSSI_CONTROLS};
use crate::error::PluginResult;
use crate::ffi::{snd_seq_event_t, SeqMessage, DSSI_NONE, DSSI_Program_Descriptor};
use crate::housekeeping::Housekeeping;
use crate::synth::{Middleware, Synth};

/// Port index of the left output
pub const PORT_OUTPUT_LEFT: usize = 0;
/// Port index of the right output
pub const PORT_OUTPUT_RIGHT: usize = 1;
/// Port index of the first control input
pub const PORT_CONTROLS: usize = 2;
/// Total number of ports
pub const PORT_COUNT: usize = PORT_CONTROLS + MAX_DSSI_CONTROLS;

/// Program descriptor handed to the host, kept until the next query
struct ProgramSlot {
    _name: CString,
    descriptor: DSSI_Program_Descriptor,
}

/// Plugin-side state of one host instance
pub struct PluginBackend<S: Synth, M: Middleware + ?Sized> {
    sample_rate: u32,
    synth: S,
    middleware: Arc<M>,
    outputs: [*mut f32; 2],
    controls: ControlPorts,
    catalog: ProgramCatalog,
    program: Option<ProgramSlot>,
    housekeeping: Housekeeping,
}

impl<S: Synth, M: Middleware + ?Sized> PluginBackend<S, M> {
    /// Create the instance and start its housekeeping worker
    pub fn new(sample_rate: u32, synth: S, middleware: Arc<M>) -> PluginResult<Self> {
        let housekeeping = Housekeeping::spawn(Arc::clone(&middleware))?;
        Ok(Self {
            sample_rate,
            synth,
            middleware,
            outputs: [std::ptr::null_mut(); 2],
            controls: ControlPorts::default(),
            catalog: ProgramCatalog::new(),
            program: None,
            housekeeping,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn synth(&self) -> &S {
        &self.synth
    }

    pub fn synth_mut(&mut self) -> &mut S {
        &mut self.synth
    }

    pub fn middleware(&self) -> &Arc<M> {
        &self.middleware
    }

    pub fn catalog(&self) -> &ProgramCatalog {
        &self.catalog
    }

    /// Bind `port` to a host buffer; unknown ports are ignored
    ///
    /// # Safety
    ///
    /// Output buffers must hold as many frames as each following run asks
    /// for; control values must stay readable while connected.
    pub unsafe fn connect_port(&mut self, port: usize, data: *mut f32) {
        match port {
            PORT_OUTPUT_LEFT => self.outputs[0] = data,
            PORT_OUTPUT_RIGHT => self.outputs[1] = data,
            _ => self.controls.connect(port - PORT_CONTROLS, data),
        }
    }

    pub fn activate(&mut self) {}

    pub fn deactivate(&mut self) {}

    /// Render `frames` into the connected outputs without events
    ///
    /// # Safety
    ///
    /// See [`run_synth`](Self::run_synth).
    pub unsafe fn run(&mut self, frames: usize) {
        self.run_synth(frames, &[]);
    }

    /// Render `frames` into the connected outputs, applying `events`
    ///
    /// Nothing happens while an output is unconnected.
    ///
    /// # Safety
    ///
    /// Both connected outputs must be valid for `frames` samples and must not
    /// overlap.
    pub unsafe fn run_synth(&mut self, frames: usize, events: &[snd_seq_event_t]) {
        let [left, right] = self.outputs;
        if left.is_null() || right.is_null() {
            return;
        }
        let left = std::slice::from_raw_parts_mut(left, frames);
        let right = std::slice::from_raw_parts_mut(right, frames);
        self.render(left, right, events);
    }

    /// Render into `left` / `right`, splitting the block at event times
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32], events: &[snd_seq_event_t]) {
        let frames = left.len().min(right.len());
        self.controls.forward(&mut self.synth);

        let mut from = 0;
        let mut to = 0;
        let mut pending = events.iter().peekable();

        loop {
            let next = pending.peek().map_or(usize::MAX, |e| e.tick() as usize);
            to = next.max(to).min(frames);

            if from < to {
                self.synth
                    .render_into(&mut left[from..to], &mut right[from..to], self.sample_rate);
                from = to;
            }

            while let Some(event) = pending.next_if(|e| e.tick() as usize <= to) {
                self.apply(event);
            }

            if to >= frames {
                break;
            }
        }
    }

    fn apply(&mut self, event: &snd_seq_event_t) {
        match event.message() {
            Some(SeqMessage::NoteOn {
                channel,
                note,
                velocity,
            }) => self.synth.note_on(channel, note, velocity),
            Some(SeqMessage::NoteOff { channel, note }) => self.synth.note_off(channel, note),
            Some(SeqMessage::Controller {
                channel,
                param,
                value,
            }) => self.synth.set_controller(channel, param as i32, value),
            None => {}
        }
    }

    /// Program at catalog position `index`
    pub fn program(&mut self, index: usize) -> Option<&ProgramEntry> {
        self.catalog.get(index, &*self.middleware)
    }

    /// Host view of [`program`](Self::program)
    ///
    /// The pointer stays valid until the next call on this instance.
    pub fn program_descriptor(&mut self, index: usize) -> *const DSSI_Program_Descriptor {
        let Some(entry) = self.catalog.get(index, &*self.middleware) else {
            return std::ptr::null();
        };
        let Ok(name) = CString::new(entry.name.as_str()) else {
            return std::ptr::null();
        };
        let descriptor = DSSI_Program_Descriptor {
            Bank: entry.bank as _,
            Program: entry.program as _,
            Name: name.as_ptr(),
        };
        let slot = self.program.insert(ProgramSlot {
            _name: name,
            descriptor,
        });
        &slot.descriptor
    }

    /// Queue a program change for the next run; invalid selections are ignored
    pub fn select_program(&mut self, bank: usize, program: usize) {
        if bank >= self.middleware.bank_count() || program >= BANK_SIZE {
            log::debug!("Ignoring selection of bank {} program {}", bank, program);
            return;
        }
        self.middleware.pending_set_bank(bank);
        self.middleware.pending_set_program(0, program);
    }

    pub fn midi_controller_for_port(&self, _port: usize) -> c_int {
        DSSI_NONE
    }
}

impl<S: Synth, M: Middleware + ?Sized> Drop for PluginBackend<S, M> {
    fn drop(&mut self) {
        self.housekeeping.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Render(usize),
        NoteOn(u8, u8, u8),
        NoteOff(u8, u8),
        Controller(u8, i32, i32),
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
        level: f32,
    }

    impl Synth for Recorder {
        fn render_into(&mut self, left: &mut [f32], right: &mut [f32], _sample_rate: u32) {
            self.calls.push(Call::Render(left.len()));
            left.fill(self.level);
            right.fill(-self.level);
        }

        fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
            self.calls.push(Call::NoteOn(channel, note, velocity));
            self.level = velocity as f32 / 127.0;
        }

        fn note_off(&mut self, channel: u8, note: u8) {
            self.calls.push(Call::NoteOff(channel, note));
            self.level = 0.0;
        }

        fn set_controller(&mut self, channel: u8, controller: i32, value: i32) {
            self.calls.push(Call::Controller(channel, controller, value));
        }
    }

    #[derive(Default)]
    struct Presets {
        ticks: AtomicUsize,
        selections: Mutex<Vec<(&'static str, usize, usize)>>,
    }

    impl Middleware for Presets {
        fn tick(&self) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }
        fn rescan_banks(&self) {}
        fn bank_count(&self) -> usize {
            2
        }
        fn load_bank(&self, bank: usize) -> Option<Vec<String>> {
            Some(vec![String::new(), format!("Bank{} Piano", bank)])
        }
        fn pending_set_bank(&self, bank: usize) {
            self.selections.lock().unwrap().push(("bank", 0, bank));
        }
        fn pending_set_program(&self, part: usize, program: usize) {
            self.selections
                .lock()
                .unwrap()
                .push(("program", part, program));
        }
    }

    fn plugin() -> PluginBackend<Recorder, Presets> {
        PluginBackend::new(48000, Recorder::default(), Arc::new(Presets::default())).unwrap()
    }

    fn renders(calls: &[Call]) -> Vec<usize> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::Render(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_events_split_the_block() {
        let mut plugin = plugin();
        let (mut left, mut right) = (vec![0.0; 128], vec![0.0; 128]);
        let events = [
            snd_seq_event_t::note_on(0, 0, 60, 100),
            snd_seq_event_t::note_off(64, 0, 60),
        ];
        plugin.render(&mut left, &mut right, &events);

        assert_eq!(
            plugin.synth().calls,
            vec![
                Call::NoteOn(0, 60, 100),
                Call::Render(64),
                Call::NoteOff(0, 60),
                Call::Render(64),
            ]
        );
        assert!(left[..64].iter().all(|&s| s > 0.0), "note sounds before note off");
        assert!(left[64..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_event_mid_block_gives_two_segments() {
        let mut plugin = plugin();
        let (mut left, mut right) = (vec![0.0; 256], vec![0.0; 256]);
        plugin.render(
            &mut left,
            &mut right,
            &[snd_seq_event_t::note_on(128, 0, 60, 100)],
        );

        assert_eq!(
            plugin.synth().calls,
            vec![Call::Render(128), Call::NoteOn(0, 60, 100), Call::Render(128)]
        );
    }

    #[test]
    fn test_no_events_renders_once() {
        let mut plugin = plugin();
        let (mut left, mut right) = (vec![1.0; 64], vec![1.0; 64]);
        plugin.render(&mut left, &mut right, &[]);
        assert_eq!(renders(&plugin.synth().calls), vec![64]);
    }

    #[test]
    fn test_simultaneous_events_keep_their_order() {
        let mut plugin = plugin();
        let (mut left, mut right) = (vec![0.0; 32], vec![0.0; 32]);
        let events = [
            snd_seq_event_t::note_on(16, 0, 60, 90),
            snd_seq_event_t::controller(16, 0, 64, 127),
            snd_seq_event_t::note_on(16, 0, 64, 90),
        ];
        plugin.render(&mut left, &mut right, &events);

        assert_eq!(
            plugin.synth().calls,
            vec![
                Call::Render(16),
                Call::NoteOn(0, 60, 90),
                Call::Controller(0, 64, 127),
                Call::NoteOn(0, 64, 90),
                Call::Render(16),
            ]
        );
    }

    #[test]
    fn test_late_and_stale_events() {
        let mut plugin = plugin();
        let (mut left, mut right) = (vec![0.0; 32], vec![0.0; 32]);
        let events = [
            snd_seq_event_t::note_on(20, 0, 60, 90),
            // Out of order: applied as soon as it is reached
            snd_seq_event_t::note_off(10, 0, 60),
            // At the block end: applied after the last segment
            snd_seq_event_t::note_on(32, 0, 62, 90),
            // Past the block: dropped
            snd_seq_event_t::note_on(40, 0, 64, 90),
        ];
        plugin.render(&mut left, &mut right, &events);

        assert_eq!(
            plugin.synth().calls,
            vec![
                Call::Render(20),
                Call::NoteOn(0, 60, 90),
                Call::NoteOff(0, 60),
                Call::Render(12),
                Call::NoteOn(0, 62, 90),
            ]
        );
    }

    #[test]
    fn test_control_ports_precede_events() {
        let mut plugin = plugin();
        let cutoff = 90.0f32;
        unsafe { plugin.connect_port(PORT_CONTROLS + 7, &cutoff as *const f32 as *mut f32) };

        let (mut left, mut right) = (vec![0.0; 16], vec![0.0; 16]);
        plugin.render(&mut left, &mut right, &[snd_seq_event_t::note_on(0, 0, 60, 1)]);

        assert_eq!(plugin.synth().calls[0], Call::Controller(0, 74, 90));
        assert_eq!(plugin.synth().calls[1], Call::NoteOn(0, 60, 1));
    }

    #[test]
    fn test_run_without_outputs_is_silent_noop() {
        let mut plugin = plugin();
        unsafe { plugin.run(64) };
        assert!(plugin.synth().calls.is_empty());
    }

    #[test]
    fn test_run_writes_connected_outputs() {
        let mut plugin = plugin();
        plugin.synth_mut().level = 0.5;
        let (mut left, mut right) = (vec![0.0f32; 32], vec![0.0f32; 32]);
        unsafe {
            plugin.connect_port(PORT_OUTPUT_LEFT, left.as_mut_ptr());
            plugin.connect_port(PORT_OUTPUT_RIGHT, right.as_mut_ptr());
            plugin.run(32);
        }
        assert!(left.iter().all(|&s| s == 0.5));
        assert!(right.iter().all(|&s| s == -0.5));
    }

    #[test]
    fn test_first_program_is_first_named_instrument() {
        let mut plugin = plugin();
        let entry = plugin.program(0).cloned().unwrap();
        assert_eq!(
            entry,
            ProgramEntry {
                bank: 0,
                program: 1,
                name: "Bank0 Piano".into()
            }
        );
        assert!(plugin.program(2).is_none());
    }

    #[test]
    fn test_program_descriptor_points_at_entry() {
        let mut plugin = plugin();
        let descriptor = plugin.program_descriptor(1);
        assert!(!descriptor.is_null());
        let (bank, program, name) = unsafe {
            let d = &*descriptor;
            (
                d.Bank,
                d.Program,
                std::ffi::CStr::from_ptr(d.Name).to_str().unwrap().to_owned(),
            )
        };
        assert_eq!((bank, program), (1, 1));
        assert_eq!(name, "Bank1 Piano");

        assert!(plugin.program_descriptor(5).is_null());
    }

    #[test]
    fn test_select_program_posts_pending_change() {
        let mut plugin = plugin();
        plugin.select_program(1, 42);
        plugin.select_program(9, 0);
        plugin.select_program(0, BANK_SIZE);

        assert_eq!(
            *plugin.middleware().selections.lock().unwrap(),
            vec![("bank", 0, 1), ("program", 0, 42)]
        );
    }

    #[test]
    fn test_drop_stops_housekeeping() {
        let plugin = plugin();
        let middleware = Arc::clone(plugin.middleware());
        drop(plugin);
        let ticks = middleware.ticks.load(Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(middleware.ticks.load(Ordering::SeqCst), ticks);
        assert_eq!(Arc::strong_count(&middleware), 1);
    }

    #[test]
    fn test_no_controller_mapping_is_advertised() {
        let plugin = plugin();
        assert_eq!(plugin.midi_controller_for_port(PORT_CONTROLS), DSSI_NONE);
    }
}
