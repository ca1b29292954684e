//! # Persistence Module
//!
//! Two kinds of documents live under the configuration directory:
//!
//! - `settings.toml`: the single settings record, read once at startup and
//!   rewritten in full after every committed edit
//! - `presets/<agent>/<name>.toml`: named recoil presets grouped by agent
//!
//! All writes go through the [`persistence_worker`] task so the input path
//! and the shell never wait on the filesystem. Reads at startup are direct.
//!
//! ## Error Handling Strategy
//! File operations return `color_eyre::Result` with context strings. A broken
//! settings document never stops the application: it degrades to defaults
//! and the fallbacks are reported as notices.

pub mod persistence_worker;
pub mod presets;
pub mod settings_file;

pub use persistence_worker::{PersistenceClient, PersistenceManager, PersistencePaths};
pub use presets::{agent_slug, PresetLibrary, PresetRecord};
pub use settings_file::{load_settings, save_settings, SettingsRecord};
