//! Control input ports mapped to MIDI controllers
//!
//! The host writes each port's value between runs. Changed values reach the
//! synth as controller changes on channel 0 at the top of the next run.

use std::ffi::CStr;

use crate::ffi::{
    LADSPA_PortRangeHint, LADSPA_PortRangeHintDescriptor, LADSPA_HINT_BOUNDED_ABOVE,
    LADSPA_HINT_BOUNDED_BELOW, LADSPA_HINT_DEFAULT_100, LADSPA_HINT_DEFAULT_MAXIMUM,
    LADSPA_HINT_DEFAULT_MIDDLE, LADSPA_HINT_DEFAULT_MINIMUM, LADSPA_HINT_INTEGER,
};
use crate::synth::Synth;

/// Number of control input ports
pub const MAX_DSSI_CONTROLS: usize = 12;

/// Channel the control ports talk to
const CONTROL_CHANNEL: u8 = 0;

/// Static description of one control port
#[derive(Debug, Clone, Copy)]
pub struct ControlDescription {
    pub controller: i32,
    pub name: &'static CStr,
    pub hint: LADSPA_PortRangeHint,
}

const fn midi_range(default: LADSPA_PortRangeHintDescriptor) -> LADSPA_PortRangeHint {
    LADSPA_PortRangeHint {
        HintDescriptor: LADSPA_HINT_BOUNDED_BELOW
            | LADSPA_HINT_BOUNDED_ABOVE
            | LADSPA_HINT_INTEGER
            | default,
        LowerBound: 0.0,
        UpperBound: 127.0,
    }
}

const fn control(
    controller: i32,
    name: &'static CStr,
    default: LADSPA_PortRangeHintDescriptor,
) -> ControlDescription {
    ControlDescription {
        controller,
        name,
        hint: midi_range(default),
    }
}

pub const CONTROL_DESCRIPTIONS: [ControlDescription; MAX_DSSI_CONTROLS] = [
    control(1, c"Modwheel", LADSPA_HINT_DEFAULT_MIDDLE),
    control(7, c"Volume", LADSPA_HINT_DEFAULT_100),
    control(10, c"Panning", LADSPA_HINT_DEFAULT_MIDDLE),
    control(11, c"Expression", LADSPA_HINT_DEFAULT_MAXIMUM),
    control(64, c"Sustain", LADSPA_HINT_DEFAULT_MINIMUM),
    control(65, c"Portamento", LADSPA_HINT_DEFAULT_MINIMUM),
    control(71, c"Filter Q", LADSPA_HINT_DEFAULT_MIDDLE),
    control(74, c"Filter cutoff", LADSPA_HINT_DEFAULT_MIDDLE),
    control(75, c"Bandwidth", LADSPA_HINT_DEFAULT_MIDDLE),
    control(76, c"FM amp", LADSPA_HINT_DEFAULT_MAXIMUM),
    control(77, c"Resonance center", LADSPA_HINT_DEFAULT_MIDDLE),
    control(78, c"Resonance bandwidth", LADSPA_HINT_DEFAULT_MIDDLE),
];

#[derive(Debug, Clone, Copy)]
struct ControlPort {
    data: *const f32,
    last: Option<i32>,
}

/// Host-connected control ports of one instance
#[derive(Debug)]
pub struct ControlPorts {
    ports: [ControlPort; MAX_DSSI_CONTROLS],
}

impl Default for ControlPorts {
    fn default() -> Self {
        Self {
            ports: [ControlPort {
                data: std::ptr::null(),
                last: None,
            }; MAX_DSSI_CONTROLS],
        }
    }
}

impl ControlPorts {
    /// Bind control `index` to a host value; out-of-range indices are ignored
    ///
    /// # Safety
    ///
    /// `data` must stay readable until it is rebound or the ports are dropped.
    pub unsafe fn connect(&mut self, index: usize, data: *const f32) {
        if let Some(port) = self.ports.get_mut(index) {
            port.data = data;
        }
    }

    pub fn is_connected(&self, index: usize) -> bool {
        self.ports.get(index).is_some_and(|p| !p.data.is_null())
    }

    /// Send every bound control whose value changed since the last call
    pub fn forward<S: Synth + ?Sized>(&mut self, synth: &mut S) {
        for (port, description) in self.ports.iter_mut().zip(CONTROL_DESCRIPTIONS.iter()) {
            if port.data.is_null() {
                continue;
            }
            // Validity guaranteed by the contract of `connect`
            let raw = unsafe { *port.data };
            if !raw.is_finite() {
                continue;
            }
            let value = (raw.round() as i32).clamp(0, 127);
            if port.last != Some(value) {
                port.last = Some(value);
                synth.set_controller(CONTROL_CHANNEL, description.controller, value);
            }
        }
    }
}
