//! Synth factory registration
//!
//! The library hosts exactly one synth type. Its crate registers a
//! constructor, usually through [`export_dssi!`](crate::export_dssi), and
//! every `instantiate` call from the host goes through it.

use std::sync::{Arc, OnceLock};

use crate::error::{PluginError, PluginResult};
use crate::plugin::PluginBackend;
use crate::synth::{Middleware, Synth};

/// Plugin instance as created for a host
pub type HostedPlugin = PluginBackend<Box<dyn Synth>, dyn Middleware>;

/// Builds the synth and its middleware for a sample rate
pub type SynthFactory = fn(sample_rate: u32) -> anyhow::Result<(Box<dyn Synth>, Arc<dyn Middleware>)>;

static SYNTH_FACTORY: OnceLock<SynthFactory> = OnceLock::new();

/// Register the synth constructor; only the first registration counts
pub fn register_factory(factory: SynthFactory) -> PluginResult<()> {
    SYNTH_FACTORY
        .set(factory)
        .map_err(|_| PluginError::AlreadyRegistered)?;
    log::debug!("DSSI synth factory registered");
    Ok(())
}

pub fn is_registered() -> bool {
    SYNTH_FACTORY.get().is_some()
}

/// Create a plugin instance through the registered factory
pub fn create_instance(sample_rate: u32) -> PluginResult<HostedPlugin> {
    let factory = SYNTH_FACTORY.get().ok_or(PluginError::NotRegistered)?;
    let (synth, middleware) = factory(sample_rate).map_err(PluginError::Synth)?;
    PluginBackend::new(sample_rate, synth, middleware)
}

/// Export the LADSPA and DSSI entry points for a synth
///
/// # Example
///
/// ```ignore
/// fn make_synth(rate: u32) -> anyhow::Result<(Box<dyn Synth>, Arc<dyn Middleware>)> {
///     let middleware = Arc::new(MyMiddleware::new(rate)?);
///     Ok((Box::new(middleware.master()), middleware))
/// }
///
/// nio_dssi::export_dssi!(make_synth);
/// ```
#[macro_export]
macro_rules! export_dssi {
    ($factory:expr) => {
        #[no_mangle]
        pub extern "C" fn ladspa_descriptor(
            index: ::std::ffi::c_ulong,
        ) -> *const $crate::ffi::LADSPA_Descriptor {
            let _ = $crate::register_factory($factory);
            $crate::ladspa_descriptor(index)
        }

        #[no_mangle]
        pub extern "C" fn dssi_descriptor(
            index: ::std::ffi::c_ulong,
        ) -> *const $crate::ffi::DSSI_Descriptor {
            let _ = $crate::register_factory($factory);
            $crate::dssi_descriptor(index)
        }
    };
}
