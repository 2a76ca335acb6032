//! Static plugin descriptors
//!
//! Built on the first lookup and kept for the lifetime of the process.

use std::ffi::{c_char, c_int, c_ulong, CStr};
use std::sync::OnceLock;

use crate::bridge;
use crate::controls::CONTROL_DESCRIPTIONS;
use crate::ffi::{
    LADSPA_Descriptor, LADSPA_PortRangeHint, DSSI_Descriptor, LADSPA_PORT_AUDIO,
    LADSPA_PORT_CONTROL, LADSPA_PORT_INPUT, LADSPA_PORT_OUTPUT,
};
use crate::plugin::PORT_COUNT;

pub const UNIQUE_ID: c_ulong = 100;
pub const LABEL: &CStr = c"ZASF";
pub const NAME: &CStr = c"ZynAddSubFX";
pub const MAKER: &CStr = c"Nasca Octavian Paul <zynaddsubfx@yahoo.com>";
pub const COPYRIGHT: &CStr = c"GNU General Public License v2 or later";
pub const DSSI_API_VERSION: c_int = 1;

const OUTPUT_NAMES: [&CStr; 2] = [c"Output L", c"Output R"];

struct Descriptors {
    ladspa: &'static LADSPA_Descriptor,
    dssi: &'static DSSI_Descriptor,
}

// Immutable after construction; the pointers only reference leaked statics
unsafe impl Send for Descriptors {}
unsafe impl Sync for Descriptors {}

static DESCRIPTORS: OnceLock<Descriptors> = OnceLock::new();

fn build() -> Descriptors {
    let names: Box<[*const c_char]> = OUTPUT_NAMES
        .iter()
        .map(|name| name.as_ptr())
        .chain(CONTROL_DESCRIPTIONS.iter().map(|c| c.name.as_ptr()))
        .collect();

    let kinds: Box<[c_int]> = std::iter::repeat(LADSPA_PORT_OUTPUT | LADSPA_PORT_AUDIO)
        .take(OUTPUT_NAMES.len())
        .chain(std::iter::repeat(LADSPA_PORT_INPUT | LADSPA_PORT_CONTROL).take(CONTROL_DESCRIPTIONS.len()))
        .collect();

    let hints: Box<[LADSPA_PortRangeHint]> = std::iter::repeat(LADSPA_PortRangeHint::default())
        .take(OUTPUT_NAMES.len())
        .chain(CONTROL_DESCRIPTIONS.iter().map(|c| c.hint))
        .collect();

    debug_assert_eq!(names.len(), PORT_COUNT);

    let ladspa: &'static LADSPA_Descriptor = Box::leak(Box::new(LADSPA_Descriptor {
        UniqueID: UNIQUE_ID,
        Label: LABEL.as_ptr(),
        Properties: 0,
        Name: NAME.as_ptr(),
        Maker: MAKER.as_ptr(),
        Copyright: COPYRIGHT.as_ptr(),
        PortCount: PORT_COUNT as c_ulong,
        PortDescriptors: Box::leak(kinds).as_ptr(),
        PortNames: Box::leak(names).as_ptr(),
        PortRangeHints: Box::leak(hints).as_ptr(),
        ImplementationData: std::ptr::null_mut(),
        instantiate: Some(bridge::instantiate),
        connect_port: Some(bridge::connect_port),
        activate: Some(bridge::activate),
        run: Some(bridge::run),
        run_adding: None,
        set_run_adding_gain: None,
        deactivate: Some(bridge::deactivate),
        cleanup: Some(bridge::cleanup),
    }));

    let dssi: &'static DSSI_Descriptor = Box::leak(Box::new(DSSI_Descriptor {
        DSSI_API_Version: DSSI_API_VERSION,
        LADSPA_Plugin: ladspa,
        configure: None,
        get_program: Some(bridge::get_program),
        select_program: Some(bridge::select_program),
        get_midi_controller_for_port: Some(bridge::get_midi_controller_for_port),
        run_synth: Some(bridge::run_synth),
        run_synth_adding: None,
        run_multiple_synths: None,
        run_multiple_synths_adding: None,
    }));

    Descriptors { ladspa, dssi }
}

fn descriptors() -> &'static Descriptors {
    DESCRIPTORS.get_or_init(build)
}

/// LADSPA descriptor number `index`; this library has only one
pub fn ladspa_descriptor(index: c_ulong) -> *const LADSPA_Descriptor {
    if index != 0 {
        return std::ptr::null();
    }
    descriptors().ladspa
}

/// DSSI descriptor number `index`; this library has only one
pub fn dssi_descriptor(index: c_ulong) -> *const DSSI_Descriptor {
    if index != 0 {
        return std::ptr::null();
    }
    descriptors().dssi
}
