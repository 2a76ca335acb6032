//! Synth-side MIDI event type

/// Controller number used for pitch bend events.
///
/// Pitch bend is delivered as a controller change whose value is the signed
/// 14-bit bend amount (`-8192..=8191`).
pub const PITCHWHEEL: i32 = 1000;

/// Kind of a translated MIDI event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MidiEventKind {
    /// Note on (value = velocity) or note off (value = 0)
    Note,
    /// Polyphonic aftertouch
    Pressure,
    /// Control change, including [`PITCHWHEEL`]
    Controller,
    /// Program change (value unused)
    ProgramChange,
}

/// MIDI event in the synth's internal representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    /// MIDI channel (0-15)
    pub channel: u8,
    pub kind: MidiEventKind,
    /// Note, controller or program number
    pub num: i32,
    /// Velocity, controller value or signed pitch bend
    pub value: i32,
    /// Frame offset inside the current block (0 when not sample accurate)
    pub time: u32,
}

impl MidiEvent {
    pub fn note(channel: u8, note: u8, velocity: u8, time: u32) -> Self {
        Self {
            channel,
            kind: MidiEventKind::Note,
            num: note as i32,
            value: velocity as i32,
            time,
        }
    }

    pub fn controller(channel: u8, num: i32, value: i32, time: u32) -> Self {
        Self {
            channel,
            kind: MidiEventKind::Controller,
            num,
            value,
            time,
        }
    }

    /// True for a note event that releases the note
    pub fn is_note_off(&self) -> bool {
        self.kind == MidiEventKind::Note && self.value == 0
    }
}
