//! CLAP plugin entry point for Rust modules
//!
//! This crate provides the `#[repr(C)]` entry table a CLAP host resolves from
//! a loaded module, the glue that backs it with a Rust [`Entry`]
//! implementation, and the macros that export it under the reserved
//! `clap_entry` name.

pub mod abi;
pub mod entry;
mod export;
pub mod version;

pub use abi::{
    factory_ids, ClapPluginEntry, ClapVersion, DeinitFn, GetFactoryFn, InitFn, CLAP_ENTRY_SYMBOL,
};
pub use entry::{Entry, EntryLoadError, EntryState, FactoryPointer};
pub use version::{VersionParseError, CLAP_VERSION};
