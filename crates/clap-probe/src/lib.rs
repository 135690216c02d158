//! Host-side tooling for CLAP modules
//!
//! Finds `.clap` files, resolves their entry tables and walks each module
//! through `init`, factory queries and `deinit`.

pub mod config;
pub mod loader;
pub mod scan;

pub use config::Config;
pub use loader::{InitializedModule, LoadedModule, PluginError};
pub use scan::{find_modules, probe, probe_module, ProbeReport};
