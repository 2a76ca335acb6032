//! Error types for the plugin backend

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("No synth factory registered")]
    NotRegistered,

    #[error("A synth factory is already registered")]
    AlreadyRegistered,

    #[error("Failed to create the synth: {0:#}")]
    Synth(anyhow::Error),

    #[error("Failed to spawn housekeeping thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
}

pub type PluginResult<T> = Result<T, PluginError>;
