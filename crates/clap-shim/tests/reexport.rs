//! Host-side view of a re-exported entry table backed by hand-written functions.

use std::ffi::{c_char, c_void, CStr};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use clap_shim::{export_clap_entry, ClapPluginEntry, ClapVersion};

static INIT_CALLS: AtomicUsize = AtomicUsize::new(0);
static DEINIT_CALLS: AtomicUsize = AtomicUsize::new(0);
static LAST_PATH: Mutex<Option<String>> = Mutex::new(None);

#[repr(C)]
struct AudioEffectFactory {
    tag: u32,
}

static AUDIO_EFFECT_FACTORY: AudioEffectFactory = AudioEffectFactory { tag: 0xc1a9 };

unsafe extern "C" fn init(plugin_path: *const c_char) -> bool {
    INIT_CALLS.fetch_add(1, Ordering::SeqCst);
    let path = unsafe { CStr::from_ptr(plugin_path) };
    *LAST_PATH.lock().unwrap() = Some(path.to_string_lossy().into_owned());
    true
}

unsafe extern "C" fn deinit() {
    DEINIT_CALLS.fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C" fn get_factory(factory_id: *const c_char) -> *const c_void {
    let id = unsafe { CStr::from_ptr(factory_id) };
    if id == c"audio-effect-factory" {
        &AUDIO_EFFECT_FACTORY as *const AudioEffectFactory as *const c_void
    } else {
        ptr::null()
    }
}

static PLUGIN_ENTRY: ClapPluginEntry = ClapPluginEntry {
    clap_version: ClapVersion::new(1, 2, 3),
    init: Some(init),
    deinit: Some(deinit),
    get_factory: Some(get_factory),
};

export_clap_entry!(PLUGIN_ENTRY);

#[test]
fn test_version_matches_source() {
    assert_eq!(clap_entry.clap_version, ClapVersion::new(1, 2, 3));
    assert_eq!(
        bytemuck::bytes_of(&clap_entry.clap_version),
        bytemuck::bytes_of(&PLUGIN_ENTRY.clap_version)
    );
    assert!(clap_entry.clap_version.is_compatible());
}

#[test]
fn test_function_pointers_are_forwarded_not_wrapped() {
    assert!(std::ptr::fn_addr_eq(
        clap_entry.init.unwrap(),
        PLUGIN_ENTRY.init.unwrap()
    ));
    assert!(std::ptr::fn_addr_eq(
        clap_entry.deinit.unwrap(),
        PLUGIN_ENTRY.deinit.unwrap()
    ));
    assert!(std::ptr::fn_addr_eq(
        clap_entry.get_factory.unwrap(),
        PLUGIN_ENTRY.get_factory.unwrap()
    ));
}

#[test]
fn test_exported_table_is_a_distinct_record() {
    assert_ne!(
        &clap_entry as *const ClapPluginEntry,
        &PLUGIN_ENTRY as *const ClapPluginEntry
    );
}

#[test]
fn test_host_lifecycle_through_exported_table() {
    let entry: &ClapPluginEntry = &clap_entry;
    assert!(entry.clap_version.is_compatible());
    assert!(entry.is_complete());

    let init = entry.init.unwrap();
    let get_factory = entry.get_factory.unwrap();
    let deinit = entry.deinit.unwrap();

    assert!(unsafe { init(c"/path/to/module".as_ptr()) });
    assert_eq!(INIT_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(
        LAST_PATH.lock().unwrap().as_deref(),
        Some("/path/to/module")
    );

    let factory = unsafe { get_factory(c"audio-effect-factory".as_ptr()) };
    assert_eq!(factory, &AUDIO_EFFECT_FACTORY as *const _ as *const c_void);
    let factory = unsafe { &*(factory as *const AudioEffectFactory) };
    assert_eq!(factory.tag, 0xc1a9);

    assert!(unsafe { get_factory(c"unknown-id".as_ptr()) }.is_null());

    unsafe { deinit() };
    assert_eq!(DEINIT_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(INIT_CALLS.load(Ordering::SeqCst), 1);
}
