//! A shared library that exports symbols, but no `clap_entry`.

#[unsafe(no_mangle)]
pub extern "C" fn no_entry_marker() -> u32 {
    7
}
