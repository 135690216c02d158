//! Entry table construction and export macros
//!
//! A module ends up with two records. The plugin implementation builds its
//! own under a name of its choosing with [`clap_entry!`](crate::clap_entry),
//! then [`export_clap_entry!`](crate::export_clap_entry) copies it into the
//! one symbol hosts look for:
//!
//! ```rust,ignore
//! use clap_shim::{clap_entry, export_clap_entry, ClapPluginEntry};
//!
//! pub static RUST_CLAP_ENTRY: ClapPluginEntry = clap_entry!(MyEntry);
//!
//! export_clap_entry!(RUST_CLAP_ENTRY);
//! ```
//!
//! The copy is evaluated at compile time. Loading the module runs no code;
//! the host's first call into it is `init`.

/// Builds a [`ClapPluginEntry`](crate::ClapPluginEntry) forwarding to an
/// [`Entry`](crate::Entry) implementation.
///
/// Each invocation owns a private `static` [`EntryState`](crate::EntryState),
/// so use it once per entry type. The version defaults to
/// [`CLAP_VERSION`](crate::CLAP_VERSION).
#[macro_export]
macro_rules! clap_entry {
    ($entry:ty) => {
        $crate::clap_entry!($entry, $crate::CLAP_VERSION)
    };
    ($entry:ty, $version:expr) => {{
        static STATE: $crate::EntryState<$entry> = $crate::EntryState::new();

        unsafe extern "C" fn init(plugin_path: *const ::std::ffi::c_char) -> bool {
            unsafe { STATE.init(plugin_path) }
        }

        unsafe extern "C" fn deinit() {
            STATE.deinit()
        }

        unsafe extern "C" fn get_factory(
            factory_id: *const ::std::ffi::c_char,
        ) -> *const ::std::ffi::c_void {
            unsafe { STATE.get_factory(factory_id) }
        }

        $crate::ClapPluginEntry {
            clap_version: $version,
            init: ::std::option::Option::Some(init),
            deinit: ::std::option::Option::Some(deinit),
            get_factory: ::std::option::Option::Some(get_factory),
        }
    }};
}

/// Declares the host-visible `clap_entry` symbol as a copy of `$source`.
///
/// `$source` is any `static` or `const` [`ClapPluginEntry`](crate::ClapPluginEntry)
/// path. It must not be `#[no_mangle]` under the name `clap_entry` itself, and
/// the macro may appear only once per linked module. Nothing is checked: the
/// source is trusted to declare a correct version and valid pointers.
#[macro_export]
macro_rules! export_clap_entry {
    ($source:path) => {
        #[allow(non_upper_case_globals)]
        #[unsafe(no_mangle)]
        pub static clap_entry: $crate::ClapPluginEntry = $source;
    };
}
