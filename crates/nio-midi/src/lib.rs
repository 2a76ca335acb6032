//! MIDI translation for the nio audio backends
//!
//! Host environments hand us raw MIDI bytes (JACK MIDI ports, sequencer
//! events). This crate turns them into the synth's internal event shape:
//!
//! - [`MidiEvent`]: channel, kind, number, value and frame offset
//! - [`translate`]: one raw message to at most one event
//! - [`dispatch`]: translate and deliver to a [`MidiSink`], falling back to
//!   3-byte raw windows for anything the translator does not understand
//!
//! Everything here is allocation-free and safe to call from a realtime
//! callback.

mod event;
mod translate;

pub use event::{MidiEvent, MidiEventKind, PITCHWHEEL};
pub use translate::{dispatch, raw_windows, translate, MidiSink, RawWindows};
