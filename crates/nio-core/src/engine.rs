//! The synth engine as seen by the backends
//!
//! The render core itself lives elsewhere. Backends only need to pull
//! blocks, resize them, and push MIDI / OSC into it, all from the thread
//! that currently owns the engine.

use nio_midi::MidiSink;

use crate::types::StereoBlock;

/// Synth render core driven by an audio backend
///
/// The backend that owns the engine calls every method from its realtime
/// thread. None of them may block or allocate.
pub trait Engine: MidiSink + Send + 'static {
    /// Change the render block size
    ///
    /// `frames` never exceeds [`MAX_BUFFER_SIZE`](crate::types::MAX_BUFFER_SIZE),
    /// so implementations can pre-allocate for it.
    fn set_buffer_size(&mut self, frames: usize);

    /// The stream now runs at `rate` Hz
    ///
    /// Called when a backend learns the rate the host or device actually
    /// runs at, which may differ from the configured one.
    fn set_sample_rate(&mut self, rate: u32) {
        let _ = rate;
    }

    /// Render the next block of `buffer_size` frames (the master mix)
    fn render(&mut self) -> StereoBlock<'_>;

    /// Output of part `index` from the last [`render`](Engine::render)
    fn part(&self, index: usize) -> Option<StereoBlock<'_>> {
        let _ = index;
        None
    }

    /// Apply one OSC message on the realtime thread
    fn apply_osc(&mut self, message: &[u8]) {
        let _ = message;
    }
}
