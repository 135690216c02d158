//! A minimal plugin module exported through `clap-shim`.
//!
//! The implementation's own table is built under `RUST_CLAP_ENTRY`, which has
//! ordinary Rust linkage, and copied into the reserved `clap_entry` symbol.
//! It serves one custom factory; everything else, including
//! `clap.plugin-factory`, is reported as unsupported.

use clap_shim::{clap_entry, export_clap_entry, ClapPluginEntry, Entry, EntryLoadError, FactoryPointer};
use std::ffi::{c_char, CStr, CString};

pub const DEMO_FACTORY_ID: &CStr = c"org.clap-shim.demo-factory";

const VENDOR: &CStr = c"clap-shim";

/// Factory served under [`DEMO_FACTORY_ID`]
#[repr(C)]
pub struct DemoFactory {
    pub vendor: unsafe extern "C" fn(factory: *const DemoFactory) -> *const c_char,
    pub plugin_path: unsafe extern "C" fn(factory: *const DemoFactory) -> *const c_char,
}

unsafe extern "C" fn demo_vendor(_factory: *const DemoFactory) -> *const c_char {
    VENDOR.as_ptr()
}

unsafe extern "C" fn demo_plugin_path(factory: *const DemoFactory) -> *const c_char {
    // The factory is always the first field of DemoEntry
    let entry = unsafe { &*(factory as *const DemoEntry) };
    entry.plugin_path.as_ptr()
}

#[repr(C)]
pub struct DemoEntry {
    factory: DemoFactory,
    plugin_path: CString,
}

impl Entry for DemoEntry {
    fn new(plugin_path: &CStr) -> Result<Self, EntryLoadError> {
        if plugin_path.to_bytes().is_empty() {
            return Err(EntryLoadError::new("empty plugin path"));
        }

        tracing::info!("demo entry loaded from {}", plugin_path.to_string_lossy());
        Ok(Self {
            factory: DemoFactory {
                vendor: demo_vendor,
                plugin_path: demo_plugin_path,
            },
            plugin_path: plugin_path.to_owned(),
        })
    }

    fn get_factory(&self, factory_id: &CStr) -> Option<FactoryPointer> {
        (factory_id == DEMO_FACTORY_ID).then(|| FactoryPointer::from_ref(&self.factory))
    }
}

pub static RUST_CLAP_ENTRY: ClapPluginEntry = clap_entry!(DemoEntry);

export_clap_entry!(RUST_CLAP_ENTRY);
