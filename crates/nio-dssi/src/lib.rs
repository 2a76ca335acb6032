//! Nio DSSI - the synth as a LADSPA/DSSI plugin
//!
//! Hosts load the library, look up the static descriptors and create one
//! [`PluginBackend`] per instance through the registered synth factory.
//!
//! # Architecture
//!
//! ```text
//! DSSI host
//!     ↓ (C ABI: ladspa_descriptor / dssi_descriptor)
//! descriptor.rs  static descriptors, built once
//!     ↓
//! bridge.rs      null checks, panic barriers
//!     ↓
//! PluginBackend  event splitting, programs, control ports
//!     ↓
//! Synth + Middleware (supplied by the synth crate)
//! ```

mod bridge;
pub mod catalog;
pub mod controls;
mod descriptor;
mod error;
mod factory;
pub mod ffi;
pub mod housekeeping;
mod plugin;
mod synth;

pub use catalog::{ProgramCatalog, ProgramEntry, BANK_SIZE};
pub use controls::{ControlPorts, MAX_DSSI_CONTROLS};
pub use descriptor::{dssi_descriptor, ladspa_descriptor, UNIQUE_ID};
pub use error::{PluginError, PluginResult};
pub use factory::{create_instance, is_registered, register_factory, HostedPlugin, SynthFactory};
pub use plugin::{PluginBackend, PORT_CONTROLS, PORT_COUNT, PORT_OUTPUT_LEFT, PORT_OUTPUT_RIGHT};
pub use synth::{Middleware, Synth};
