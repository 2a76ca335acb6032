//! Raw MIDI bytes to [`MidiEvent`]
//!
//! Message layout, by status nibble:
//! - Note Off: 0x8n nn vv → Note, value 0
//! - Note On: 0x9n nn vv → Note, value vv (vv = 0 stays a Note On with velocity 0)
//! - Aftertouch: 0xAn nn vv → Pressure
//! - Control Change: 0xBn cc vv → Controller
//! - Program Change: 0xCn pp → ProgramChange
//! - Pitch Bend: 0xEn ll hh → Controller(PITCHWHEEL, ((hh << 7) | ll) - 8192)
//!
//! Anything else (system messages, running status, junk below 0x80) is not
//! translated; [`dispatch`] hands it to the sink's raw handler in 3-byte
//! windows instead.

use crate::event::{MidiEvent, MidiEventKind, PITCHWHEEL};

/// Receiver of translated MIDI
///
/// Implemented by the synth's event bus. Both methods are called from the
/// realtime thread and must not block.
pub trait MidiSink {
    /// A translated event
    fn midi_event(&mut self, event: MidiEvent);

    /// A raw 3-byte window the translator did not understand
    fn raw_midi(&mut self, window: [u8; 3]) {
        let _ = window;
    }
}

/// First three bytes of `msg`, zero padded, with both data bytes masked to 7 bits
fn head(msg: &[u8]) -> [u8; 3] {
    let mut buf = [0u8; 3];
    let n = msg.len().min(3);
    buf[..n].copy_from_slice(&msg[..n]);
    buf[1] &= 0x7F;
    buf[2] &= 0x7F;
    buf
}

/// Translate one raw MIDI message
///
/// `time` is the frame offset inside the current block; pass 0 when the host
/// is not sample accurate. Returns `None` for messages that must go through
/// the raw handler.
pub fn translate(msg: &[u8], time: u32) -> Option<MidiEvent> {
    if msg.is_empty() {
        return None;
    }

    let [status, d1, d2] = head(msg);
    let channel = status & 0x0F;

    let (kind, num, value) = match status & 0xF0 {
        0x80 => (MidiEventKind::Note, d1 as i32, 0),
        0x90 => (MidiEventKind::Note, d1 as i32, d2 as i32),
        0xA0 => (MidiEventKind::Pressure, d1 as i32, d2 as i32),
        0xB0 => (MidiEventKind::Controller, d1 as i32, d2 as i32),
        0xC0 => (MidiEventKind::ProgramChange, d1 as i32, 0),
        0xE0 => (
            MidiEventKind::Controller,
            PITCHWHEEL,
            (((d2 as i32) << 7) | d1 as i32) - 8192,
        ),
        _ => return None,
    };

    Some(MidiEvent {
        channel,
        kind,
        num,
        value,
        time,
    })
}

/// Translate `msg` and deliver the result to `sink`
///
/// Untranslatable messages are split into consecutive 3-byte windows (the
/// last one zero padded) and passed to [`MidiSink::raw_midi`] in order.
pub fn dispatch<S: MidiSink + ?Sized>(msg: &[u8], time: u32, sink: &mut S) {
    match translate(msg, time) {
        Some(event) => sink.midi_event(event),
        None => raw_windows(msg).for_each(|window| sink.raw_midi(window)),
    }
}

/// Iterator over zero-padded 3-byte windows of a message
pub struct RawWindows<'a> {
    chunks: std::slice::Chunks<'a, u8>,
}

impl Iterator for RawWindows<'_> {
    type Item = [u8; 3];

    fn next(&mut self) -> Option<[u8; 3]> {
        self.chunks.next().map(|chunk| {
            let mut window = [0u8; 3];
            window[..chunk.len()].copy_from_slice(chunk);
            window
        })
    }
}

pub fn raw_windows(msg: &[u8]) -> RawWindows<'_> {
    RawWindows {
        chunks: msg.chunks(3),
    }
}
