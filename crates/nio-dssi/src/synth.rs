//! The synth as seen from inside a plugin host

/// Render core and event sink, driven from the host's audio thread
pub trait Synth: Send {
    /// Render `left.len()` frames into both channels
    fn render_into(&mut self, left: &mut [f32], right: &mut [f32], sample_rate: u32);

    fn note_on(&mut self, channel: u8, note: u8, velocity: u8);

    fn note_off(&mut self, channel: u8, note: u8);

    fn set_controller(&mut self, channel: u8, controller: i32, value: i32);
}

impl<S: Synth + ?Sized> Synth for Box<S> {
    fn render_into(&mut self, left: &mut [f32], right: &mut [f32], sample_rate: u32) {
        (**self).render_into(left, right, sample_rate)
    }

    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        (**self).note_on(channel, note, velocity)
    }

    fn note_off(&mut self, channel: u8, note: u8) {
        (**self).note_off(channel, note)
    }

    fn set_controller(&mut self, channel: u8, controller: i32, value: i32) {
        (**self).set_controller(channel, controller, value)
    }
}

/// Preset side of the synth: banks, program changes and background work
///
/// Shared between the host's threads and the housekeeping worker, so every
/// method takes `&self` and implementations synchronise internally.
pub trait Middleware: Send + Sync + 'static {
    /// Periodic background work (preset loading, message routing)
    fn tick(&self);

    /// Re-read the list of bank directories
    fn rescan_banks(&self);

    /// Number of banks found by the last rescan
    fn bank_count(&self) -> usize;

    /// Load bank `bank` and return its instrument names by slot
    ///
    /// None when the bank has no directory, which ends enumeration.
    fn load_bank(&self, bank: usize) -> Option<Vec<String>>;

    /// Switch to `bank` before the next render
    fn pending_set_bank(&self, bank: usize);

    /// Load `program` of the pending bank into `part` before the next render
    fn pending_set_program(&self, part: usize, program: usize);
}
