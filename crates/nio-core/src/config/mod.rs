//! Loading and saving of persisted settings
//!
//! Settings live as YAML under the user config directory. A missing or
//! unreadable file falls back to defaults so a fresh install starts cleanly.

mod io;
mod paths;

pub use io::{load_config, load_or_default, save_config};
pub use paths::{config_dir, default_config_path, CONFIG_FILE};
