//! Plugin-side entry glue
//!
//! A plugin implements [`Entry`] once; [`crate::clap_entry!`] turns it into a
//! [`ClapPluginEntry`](crate::ClapPluginEntry) whose three functions forward to
//! a process-wide [`EntryState`].

use std::any::Any;
use std::ffi::{c_char, c_void, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::{self, NonNull};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

/// Returned by [`Entry::new`] when the module cannot be used.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EntryLoadError(String);

impl EntryLoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl Default for EntryLoadError {
    fn default() -> Self {
        Self::new("plugin entry failed to initialize")
    }
}

/// Non-owning pointer to a factory object handed back to the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FactoryPointer(NonNull<c_void>);

impl FactoryPointer {
    /// The referent must stay put until `deinit`, which holds for anything
    /// owned by the [`Entry`] value or living in a `static`.
    pub fn from_ref<T>(factory: &T) -> Self {
        Self(NonNull::from(factory).cast())
    }

    pub fn as_ptr(self) -> *const c_void {
        self.0.as_ptr()
    }
}

/// What a plugin implementation provides behind the entry table.
pub trait Entry: Sized + Send + Sync + 'static {
    /// Called on the first successful `init`. `plugin_path` is where the host
    /// found the module; co-located resources resolve against it.
    fn new(plugin_path: &CStr) -> Result<Self, EntryLoadError>;

    /// Capability query. `None` means the id is not supported.
    fn get_factory(&self, factory_id: &CStr) -> Option<FactoryPointer>;
}

struct Initialized<E> {
    entry: E,
    ref_count: usize,
}

/// Process-wide storage for one [`Entry`] type.
///
/// `init` is reference counted: repeated calls share the same `E` and each one
/// needs a matching `deinit`. Calls out of order degrade to `false`/null/no-op
/// instead of touching an absent entry.
pub struct EntryState<E> {
    inner: RwLock<Option<Initialized<E>>>,
}

impl<E: Entry> EntryState<E> {
    pub const fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Initialized<E>>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Initialized<E>>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_initialized(&self) -> bool {
        self.read().is_some()
    }

    /// # Safety
    ///
    /// `plugin_path` must be null or point to a NUL-terminated string valid for
    /// the duration of the call.
    pub unsafe fn init(&self, plugin_path: *const c_char) -> bool {
        if plugin_path.is_null() {
            tracing::error!("init called with a null plugin path");
            return false;
        }
        let path = CStr::from_ptr(plugin_path);

        let mut state = self.write();
        if let Some(initialized) = state.as_mut() {
            initialized.ref_count += 1;
            return true;
        }

        match guard("init", || E::new(path)) {
            Some(Ok(entry)) => {
                *state = Some(Initialized {
                    entry,
                    ref_count: 1,
                });
                tracing::debug!(path = %path.to_string_lossy(), "plugin entry initialized");
                true
            }
            Some(Err(e)) => {
                tracing::error!(path = %path.to_string_lossy(), "plugin entry init failed: {e}");
                false
            }
            None => false,
        }
    }

    pub fn deinit(&self) {
        let mut state = self.write();
        let Some(initialized) = state.as_mut() else {
            tracing::warn!("deinit called on an uninitialized plugin entry");
            return;
        };

        initialized.ref_count -= 1;
        if initialized.ref_count == 0 {
            if let Some(Initialized { entry, .. }) = state.take() {
                guard("deinit", move || drop(entry));
            }
        }
    }

    /// # Safety
    ///
    /// `factory_id` must be null or point to a NUL-terminated string valid for
    /// the duration of the call.
    pub unsafe fn get_factory(&self, factory_id: *const c_char) -> *const c_void {
        if factory_id.is_null() {
            return ptr::null();
        }
        let factory_id = CStr::from_ptr(factory_id);

        let state = self.read();
        let Some(initialized) = state.as_ref() else {
            tracing::warn!(id = %factory_id.to_string_lossy(), "get_factory called before init");
            return ptr::null();
        };

        guard("get_factory", || initialized.entry.get_factory(factory_id))
            .flatten()
            .map_or(ptr::null(), FactoryPointer::as_ptr)
    }
}

impl<E: Entry> Default for EntryState<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Runs `f`, turning a panic into `None`. Unwinding out of an `extern "C"`
/// function aborts the host.
fn guard<T>(op: &'static str, f: impl FnOnce() -> T) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            tracing::error!("panic in plugin entry `{op}`: {}", panic_message(&*payload));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        static DROPS: Cell<usize> = const { Cell::new(0) };
    }

    struct TestFactory {
        name: &'static str,
    }

    struct TestEntry {
        factory: TestFactory,
    }

    impl Entry for TestEntry {
        fn new(plugin_path: &CStr) -> Result<Self, EntryLoadError> {
            match plugin_path.to_bytes() {
                b"fail" => Err(EntryLoadError::new("refused")),
                b"panic" => panic!("entry exploded"),
                _ => Ok(Self {
                    factory: TestFactory { name: "test" },
                }),
            }
        }

        fn get_factory(&self, factory_id: &CStr) -> Option<FactoryPointer> {
            match factory_id.to_bytes() {
                b"test.factory" => Some(FactoryPointer::from_ref(&self.factory)),
                b"test.panic" => panic!("factory exploded"),
                _ => None,
            }
        }
    }

    impl Drop for TestEntry {
        fn drop(&mut self) {
            DROPS.with(|d| d.set(d.get() + 1));
        }
    }

    fn drops() -> usize {
        DROPS.with(|d| d.get())
    }

    #[test]
    fn test_get_factory_before_init_is_null() {
        let state = EntryState::<TestEntry>::new();
        let ptr = unsafe { state.get_factory(c"test.factory".as_ptr()) };
        assert!(ptr.is_null());
        assert!(!state.is_initialized());
    }

    #[test]
    fn test_init_get_factory_deinit() {
        let state = EntryState::<TestEntry>::new();
        assert!(unsafe { state.init(c"/plugins/test.clap".as_ptr()) });
        assert!(state.is_initialized());

        let ptr = unsafe { state.get_factory(c"test.factory".as_ptr()) };
        assert!(!ptr.is_null());
        let factory = unsafe { &*(ptr as *const TestFactory) };
        assert_eq!(factory.name, "test");

        // Same object every time within a session
        let again = unsafe { state.get_factory(c"test.factory".as_ptr()) };
        assert_eq!(ptr, again);

        assert!(unsafe { state.get_factory(c"unknown-id".as_ptr()) }.is_null());

        let before = drops();
        state.deinit();
        assert_eq!(drops(), before + 1);
        assert!(!state.is_initialized());
        assert!(unsafe { state.get_factory(c"test.factory".as_ptr()) }.is_null());
    }

    #[test]
    fn test_init_is_reference_counted() {
        let state = EntryState::<TestEntry>::new();
        assert!(unsafe { state.init(c"a".as_ptr()) });
        assert!(unsafe { state.init(c"a".as_ptr()) });

        let before = drops();
        state.deinit();
        assert!(state.is_initialized());
        assert_eq!(drops(), before);

        state.deinit();
        assert!(!state.is_initialized());
        assert_eq!(drops(), before + 1);
    }

    #[test]
    fn test_failed_init_leaves_state_empty() {
        let state = EntryState::<TestEntry>::new();
        assert!(!unsafe { state.init(c"fail".as_ptr()) });
        assert!(!state.is_initialized());
        assert!(!unsafe { state.init(ptr::null()) });
        assert!(!state.is_initialized());
    }

    #[test]
    fn test_panics_do_not_cross_the_boundary() {
        let state = EntryState::<TestEntry>::new();
        assert!(!unsafe { state.init(c"panic".as_ptr()) });
        assert!(!state.is_initialized());

        // The lock must still be usable after the caught panic
        assert!(unsafe { state.init(c"ok".as_ptr()) });
        assert!(unsafe { state.get_factory(c"test.panic".as_ptr()) }.is_null());
        assert!(!unsafe { state.get_factory(c"test.factory".as_ptr()) }.is_null());
        state.deinit();
    }

    #[test]
    fn test_out_of_order_calls_are_harmless() {
        let state = EntryState::<TestEntry>::new();
        state.deinit();
        state.deinit();
        assert!(unsafe { state.get_factory(ptr::null()) }.is_null());
        assert!(unsafe { state.init(c"ok".as_ptr()) });
        state.deinit();
        state.deinit();
        assert!(!state.is_initialized());
    }

    #[test]
    fn test_concurrent_get_factory() {
        let state = EntryState::<TestEntry>::new();
        assert!(unsafe { state.init(c"ok".as_ptr()) });
        let expected = unsafe { state.get_factory(c"test.factory".as_ptr()) } as usize;

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        let ptr = unsafe { state.get_factory(c"test.factory".as_ptr()) };
                        assert_eq!(ptr as usize, expected);
                    }
                });
            }
        });

        state.deinit();
    }
}
