//! C entry points behind the static descriptors
//!
//! Each handle is a boxed [`HostedPlugin`]. Every function checks for null
//! and catches panics so that nothing unwinds into the host.

use std::ffi::{c_int, c_ulong};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

use crate::descriptor::UNIQUE_ID;
use crate::factory::{create_instance, HostedPlugin};
use crate::ffi::{
    snd_seq_event_t, DSSI_Program_Descriptor, LADSPA_Data, LADSPA_Descriptor, LADSPA_Handle,
    DSSI_NONE,
};

/// Run `$body` with `$plugin` bound to the instance behind `$handle`
macro_rules! with_plugin {
    ($handle:expr, $default:expr, |$plugin:ident| $body:expr) => {{
        if $handle.is_null() {
            return $default;
        }
        catch_unwind(AssertUnwindSafe(|| {
            let $plugin = unsafe { &mut *($handle as *mut HostedPlugin) };
            $body
        }))
        .unwrap_or($default)
    }};
}

pub unsafe extern "C" fn instantiate(
    descriptor: *const LADSPA_Descriptor,
    sample_rate: c_ulong,
) -> LADSPA_Handle {
    if descriptor.is_null() || unsafe { (*descriptor).UniqueID } != UNIQUE_ID {
        return ptr::null_mut();
    }
    let created = catch_unwind(|| create_instance(sample_rate as u32));
    match created {
        Ok(Ok(plugin)) => Box::into_raw(Box::new(plugin)).cast(),
        Ok(Err(e)) => {
            log::error!("Failed to instantiate plugin: {}", e);
            ptr::null_mut()
        }
        Err(_) => {
            log::error!("Plugin construction panicked");
            ptr::null_mut()
        }
    }
}

pub unsafe extern "C" fn connect_port(handle: LADSPA_Handle, port: c_ulong, data: *mut LADSPA_Data) {
    with_plugin!(handle, (), |plugin| unsafe {
        plugin.connect_port(port as usize, data)
    })
}

pub unsafe extern "C" fn activate(handle: LADSPA_Handle) {
    with_plugin!(handle, (), |plugin| plugin.activate())
}

pub unsafe extern "C" fn deactivate(handle: LADSPA_Handle) {
    with_plugin!(handle, (), |plugin| plugin.deactivate())
}

pub unsafe extern "C" fn run(handle: LADSPA_Handle, sample_count: c_ulong) {
    with_plugin!(handle, (), |plugin| unsafe { plugin.run(sample_count as usize) })
}

pub unsafe extern "C" fn run_synth(
    handle: LADSPA_Handle,
    sample_count: c_ulong,
    events: *mut snd_seq_event_t,
    event_count: c_ulong,
) {
    let events: &[snd_seq_event_t] = if events.is_null() || event_count == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(events, event_count as usize) }
    };
    with_plugin!(handle, (), |plugin| unsafe {
        plugin.run_synth(sample_count as usize, events)
    })
}

/// Destroy the instance; the handle is dangling afterwards
pub unsafe extern "C" fn cleanup(handle: LADSPA_Handle) {
    if handle.is_null() {
        return;
    }
    let plugin = unsafe { Box::from_raw(handle as *mut HostedPlugin) };
    if catch_unwind(AssertUnwindSafe(move || drop(plugin))).is_err() {
        log::error!("Plugin teardown panicked");
    }
}

pub unsafe extern "C" fn get_program(
    handle: LADSPA_Handle,
    index: c_ulong,
) -> *const DSSI_Program_Descriptor {
    with_plugin!(handle, ptr::null(), |plugin| plugin
        .program_descriptor(index as usize))
}

pub unsafe extern "C" fn select_program(handle: LADSPA_Handle, bank: c_ulong, program: c_ulong) {
    with_plugin!(handle, (), |plugin| plugin
        .select_program(bank as usize, program as usize))
}

pub unsafe extern "C" fn get_midi_controller_for_port(handle: LADSPA_Handle, port: c_ulong) -> c_int {
    with_plugin!(handle, DSSI_NONE, |plugin| plugin
        .midi_controller_for_port(port as usize))
}
