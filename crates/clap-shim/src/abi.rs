//! `#[repr(C)]` mirror of the CLAP plugin entry point
//!
//! Field order and widths are dictated by the host ABI. Nothing in here may be
//! reordered, widened or wrapped.

use bytemuck::{Pod, Zeroable};
use std::ffi::{c_char, c_void, CStr};
use std::mem::{align_of, offset_of, size_of};

/// Name under which hosts resolve the entry table.
pub const CLAP_ENTRY_SYMBOL: &CStr = c"clap_entry";

/// Factory identifiers defined by the CLAP headers
pub mod factory_ids {
    use std::ffi::CStr;

    pub const PLUGIN_FACTORY: &CStr = c"clap.plugin-factory";
    pub const PRESET_DISCOVERY_FACTORY: &CStr = c"clap.preset-discovery-factory/2";
    pub const PLUGIN_INVALIDATION_FACTORY: &CStr = c"clap.plugin-invalidation-factory/1";
    pub const PLUGIN_STATE_CONVERTER_FACTORY: &CStr = c"clap.plugin-state-converter-factory/1";

    /// Every well-known id, in the order a host usually asks for them.
    pub const ALL: [&CStr; 4] = [
        PLUGIN_FACTORY,
        PRESET_DISCOVERY_FACTORY,
        PLUGIN_INVALIDATION_FACTORY,
        PLUGIN_STATE_CONVERTER_FACTORY,
    ];
}

/// ABI dialect triple, `clap_version_t` on the C side
#[repr(C)]
#[derive(Pod, Zeroable, Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClapVersion {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
}

/// `bool init(const char *plugin_path)`
pub type InitFn = unsafe extern "C" fn(plugin_path: *const c_char) -> bool;

/// `void deinit(void)`
pub type DeinitFn = unsafe extern "C" fn();

/// `const void *get_factory(const char *factory_id)`
pub type GetFactoryFn = unsafe extern "C" fn(factory_id: *const c_char) -> *const c_void;

/// The entry table, `clap_plugin_entry_t` on the C side.
///
/// Each function slot is an `Option` so that a null pointer written by a
/// foreign toolchain is representable. `Option<extern fn>` has the same size
/// as the bare pointer.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct ClapPluginEntry {
    pub clap_version: ClapVersion,
    pub init: Option<InitFn>,
    pub deinit: Option<DeinitFn>,
    pub get_factory: Option<GetFactoryFn>,
}

impl ClapPluginEntry {
    /// A table declaring `version` with every function slot null.
    pub const fn null(version: ClapVersion) -> Self {
        Self {
            clap_version: version,
            init: None,
            deinit: None,
            get_factory: None,
        }
    }

    /// Whether all three function slots are populated
    pub fn is_complete(&self) -> bool {
        self.init.is_some() && self.deinit.is_some() && self.get_factory.is_some()
    }
}

/// Offset of the first function pointer: the version triple rounded up to
/// pointer alignment.
pub const FUNCTIONS_OFFSET: usize = {
    let align = align_of::<Option<InitFn>>();
    size_of::<ClapVersion>().div_ceil(align) * align
};

const POINTER_SIZE: usize = size_of::<*const c_void>();

const _: () = {
    assert!(size_of::<ClapVersion>() == 12);
    assert!(align_of::<ClapVersion>() == 4);
    assert!(offset_of!(ClapVersion, major) == 0);
    assert!(offset_of!(ClapVersion, minor) == 4);
    assert!(offset_of!(ClapVersion, revision) == 8);

    assert!(size_of::<Option<InitFn>>() == POINTER_SIZE);
    assert!(size_of::<Option<DeinitFn>>() == POINTER_SIZE);
    assert!(size_of::<Option<GetFactoryFn>>() == POINTER_SIZE);

    assert!(offset_of!(ClapPluginEntry, clap_version) == 0);
    assert!(offset_of!(ClapPluginEntry, init) == FUNCTIONS_OFFSET);
    assert!(offset_of!(ClapPluginEntry, deinit) == FUNCTIONS_OFFSET + POINTER_SIZE);
    assert!(offset_of!(ClapPluginEntry, get_factory) == FUNCTIONS_OFFSET + 2 * POINTER_SIZE);
    assert!(size_of::<ClapPluginEntry>() == FUNCTIONS_OFFSET + 3 * POINTER_SIZE);
    assert!(align_of::<ClapPluginEntry>() == align_of::<*const c_void>());
};
