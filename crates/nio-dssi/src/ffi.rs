//! LADSPA and DSSI C ABI
//!
//! Layouts follow `ladspa.h` (v1.1), `dssi.h` (API version 1) and the ALSA
//! sequencer event from `asoundlib.h`.

#![allow(non_camel_case_types, non_snake_case)]

use std::ffi::{c_char, c_int, c_uchar, c_uint, c_ulong, c_void};

pub type LADSPA_Data = f32;
pub type LADSPA_Handle = *mut c_void;
pub type LADSPA_Properties = c_int;
pub type LADSPA_PortDescriptor = c_int;
pub type LADSPA_PortRangeHintDescriptor = c_int;

// Port descriptor bits
pub const LADSPA_PORT_INPUT: LADSPA_PortDescriptor = 0x1;
pub const LADSPA_PORT_OUTPUT: LADSPA_PortDescriptor = 0x2;
pub const LADSPA_PORT_CONTROL: LADSPA_PortDescriptor = 0x4;
pub const LADSPA_PORT_AUDIO: LADSPA_PortDescriptor = 0x8;

// Range hint bits
pub const LADSPA_HINT_BOUNDED_BELOW: LADSPA_PortRangeHintDescriptor = 0x1;
pub const LADSPA_HINT_BOUNDED_ABOVE: LADSPA_PortRangeHintDescriptor = 0x2;
pub const LADSPA_HINT_INTEGER: LADSPA_PortRangeHintDescriptor = 0x20;
pub const LADSPA_HINT_DEFAULT_MINIMUM: LADSPA_PortRangeHintDescriptor = 0x40;
pub const LADSPA_HINT_DEFAULT_MIDDLE: LADSPA_PortRangeHintDescriptor = 0xC0;
pub const LADSPA_HINT_DEFAULT_MAXIMUM: LADSPA_PortRangeHintDescriptor = 0x140;
pub const LADSPA_HINT_DEFAULT_100: LADSPA_PortRangeHintDescriptor = 0x280;

/// `get_midi_controller_for_port` answer for an unmapped port
pub const DSSI_NONE: c_int = -1;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LADSPA_PortRangeHint {
    pub HintDescriptor: LADSPA_PortRangeHintDescriptor,
    pub LowerBound: LADSPA_Data,
    pub UpperBound: LADSPA_Data,
}

#[repr(C)]
pub struct LADSPA_Descriptor {
    pub UniqueID: c_ulong,
    pub Label: *const c_char,
    pub Properties: LADSPA_Properties,
    pub Name: *const c_char,
    pub Maker: *const c_char,
    pub Copyright: *const c_char,
    pub PortCount: c_ulong,
    pub PortDescriptors: *const LADSPA_PortDescriptor,
    pub PortNames: *const *const c_char,
    pub PortRangeHints: *const LADSPA_PortRangeHint,
    pub ImplementationData: *mut c_void,
    pub instantiate:
        Option<unsafe extern "C" fn(*const LADSPA_Descriptor, c_ulong) -> LADSPA_Handle>,
    pub connect_port: Option<unsafe extern "C" fn(LADSPA_Handle, c_ulong, *mut LADSPA_Data)>,
    pub activate: Option<unsafe extern "C" fn(LADSPA_Handle)>,
    pub run: Option<unsafe extern "C" fn(LADSPA_Handle, c_ulong)>,
    pub run_adding: Option<unsafe extern "C" fn(LADSPA_Handle, c_ulong)>,
    pub set_run_adding_gain: Option<unsafe extern "C" fn(LADSPA_Handle, LADSPA_Data)>,
    pub deactivate: Option<unsafe extern "C" fn(LADSPA_Handle)>,
    pub cleanup: Option<unsafe extern "C" fn(LADSPA_Handle)>,
}

#[repr(C)]
#[derive(Debug)]
pub struct DSSI_Program_Descriptor {
    pub Bank: c_ulong,
    pub Program: c_ulong,
    pub Name: *const c_char,
}

#[repr(C)]
pub struct DSSI_Descriptor {
    pub DSSI_API_Version: c_int,
    pub LADSPA_Plugin: *const LADSPA_Descriptor,
    pub configure:
        Option<unsafe extern "C" fn(LADSPA_Handle, *const c_char, *const c_char) -> *mut c_char>,
    pub get_program:
        Option<unsafe extern "C" fn(LADSPA_Handle, c_ulong) -> *const DSSI_Program_Descriptor>,
    pub select_program: Option<unsafe extern "C" fn(LADSPA_Handle, c_ulong, c_ulong)>,
    pub get_midi_controller_for_port: Option<unsafe extern "C" fn(LADSPA_Handle, c_ulong) -> c_int>,
    pub run_synth:
        Option<unsafe extern "C" fn(LADSPA_Handle, c_ulong, *mut snd_seq_event_t, c_ulong)>,
    pub run_synth_adding:
        Option<unsafe extern "C" fn(LADSPA_Handle, c_ulong, *mut snd_seq_event_t, c_ulong)>,
    pub run_multiple_synths: Option<
        unsafe extern "C" fn(
            c_ulong,
            *mut LADSPA_Handle,
            c_ulong,
            *mut *mut snd_seq_event_t,
            *mut c_ulong,
        ),
    >,
    pub run_multiple_synths_adding: Option<
        unsafe extern "C" fn(
            c_ulong,
            *mut LADSPA_Handle,
            c_ulong,
            *mut *mut snd_seq_event_t,
            *mut c_ulong,
        ),
    >,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ALSA sequencer events
// ═══════════════════════════════════════════════════════════════════════════════

pub const SND_SEQ_EVENT_NOTEON: c_uchar = 6;
pub const SND_SEQ_EVENT_NOTEOFF: c_uchar = 7;
pub const SND_SEQ_EVENT_CONTROLLER: c_uchar = 10;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct snd_seq_real_time_t {
    pub tv_sec: c_uint,
    pub tv_nsec: c_uint,
}

/// Event time; DSSI hosts put the frame offset in `tick`
#[repr(C)]
#[derive(Clone, Copy)]
pub union snd_seq_timestamp_t {
    pub tick: c_uint,
    pub time: snd_seq_real_time_t,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct snd_seq_addr_t {
    pub client: c_uchar,
    pub port: c_uchar,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct snd_seq_ev_note_t {
    pub channel: c_uchar,
    pub note: c_uchar,
    pub velocity: c_uchar,
    pub off_velocity: c_uchar,
    pub duration: c_uint,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct snd_seq_ev_ctrl_t {
    pub channel: c_uchar,
    pub unused: [c_uchar; 3],
    pub param: c_uint,
    pub value: c_int,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union snd_seq_event_data_t {
    pub note: snd_seq_ev_note_t,
    pub control: snd_seq_ev_ctrl_t,
    pub raw8: [c_uchar; 12],
    pub raw32: [c_uint; 3],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct snd_seq_event_t {
    pub type_: c_uchar,
    pub flags: c_uchar,
    pub tag: c_uchar,
    pub queue: c_uchar,
    pub time: snd_seq_timestamp_t,
    pub source: snd_seq_addr_t,
    pub dest: snd_seq_addr_t,
    pub data: snd_seq_event_data_t,
}

const _: () = assert!(std::mem::size_of::<snd_seq_event_t>() == 28);
const _: () = assert!(std::mem::size_of::<snd_seq_ev_ctrl_t>() == 12);

/// Sequencer event content the synth reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    Controller { channel: u8, param: u32, value: i32 },
}

impl snd_seq_event_t {
    fn with(type_: c_uchar, tick: u32, data: snd_seq_event_data_t) -> Self {
        Self {
            type_,
            flags: 0,
            tag: 0,
            queue: 0,
            time: snd_seq_timestamp_t { tick },
            source: snd_seq_addr_t::default(),
            dest: snd_seq_addr_t::default(),
            data,
        }
    }

    fn note(type_: c_uchar, tick: u32, channel: u8, note: u8, velocity: u8) -> Self {
        let note = snd_seq_ev_note_t {
            channel,
            note,
            velocity,
            ..Default::default()
        };
        Self::with(type_, tick, snd_seq_event_data_t { note })
    }

    pub fn note_on(tick: u32, channel: u8, note: u8, velocity: u8) -> Self {
        Self::note(SND_SEQ_EVENT_NOTEON, tick, channel, note, velocity)
    }

    pub fn note_off(tick: u32, channel: u8, note: u8) -> Self {
        Self::note(SND_SEQ_EVENT_NOTEOFF, tick, channel, note, 0)
    }

    pub fn controller(tick: u32, channel: u8, param: u32, value: i32) -> Self {
        let control = snd_seq_ev_ctrl_t {
            channel,
            param,
            value,
            ..Default::default()
        };
        Self::with(SND_SEQ_EVENT_CONTROLLER, tick, snd_seq_event_data_t { control })
    }

    /// Frame offset of the event inside the current run
    #[inline]
    pub fn tick(&self) -> u32 {
        // Both timestamp variants start with a u32
        unsafe { self.time.tick }
    }

    /// Decode note and controller events; anything else is None
    pub fn message(&self) -> Option<SeqMessage> {
        // Every data variant is plain bytes of the same 12-byte union
        unsafe {
            match self.type_ {
                SND_SEQ_EVENT_NOTEON => Some(SeqMessage::NoteOn {
                    channel: self.data.note.channel,
                    note: self.data.note.note,
                    velocity: self.data.note.velocity,
                }),
                SND_SEQ_EVENT_NOTEOFF => Some(SeqMessage::NoteOff {
                    channel: self.data.note.channel,
                    note: self.data.note.note,
                }),
                SND_SEQ_EVENT_CONTROLLER => Some(SeqMessage::Controller {
                    channel: self.data.control.channel,
                    param: self.data.control.param,
                    value: self.data.control.value,
                }),
                _ => None,
            }
        }
    }
}

impl std::fmt::Debug for snd_seq_event_t {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("snd_seq_event_t")
            .field("type", &self.type_)
            .field("tick", &self.tick())
            .field("message", &self.message())
            .finish()
    }
}
