//! Host-side module loading
//!
//! Drives a module through `Loaded -> Initialized -> Unloaded`. Each state is
//! its own type, so calls outside the allowed window do not compile:
//! [`LoadedModule::init`] consumes the loaded module, and the library handle
//! is released only after `deinit` has run.

use clap_shim::{ClapPluginEntry, ClapVersion, CLAP_ENTRY_SYMBOL};
use libloading::{Library, Symbol};
use std::ffi::{c_void, CStr, CString};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use thiserror::Error;

/// Errors that can occur while loading or initializing a module
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("invalid module path {0:?}")]
    InvalidPath(PathBuf),
    #[error("failed to load module: {0}")]
    LoadFailed(#[from] libloading::Error),
    #[error("module does not export `clap_entry`")]
    MissingSymbol,
    #[error("`clap_entry` is a null pointer")]
    NullEntry,
    #[error("incompatible CLAP version {found}")]
    IncompatibleVersion { found: ClapVersion },
    #[error("CLAP version {found} is older than the required {required}")]
    VersionTooOld {
        found: ClapVersion,
        required: ClapVersion,
    },
    #[error("entry table has a null `{0}` pointer")]
    MissingFunction(&'static str),
    #[error("module at {0:?} failed to initialize")]
    InitFailed(PathBuf),
}

/// File a module's code lives in. A macOS `.clap` bundle is a directory with
/// the binary under `Contents/MacOS`.
pub fn binary_path(path: &Path) -> Result<PathBuf, PluginError> {
    if !path.is_dir() {
        return Ok(path.to_path_buf());
    }

    let stem = path
        .file_stem()
        .ok_or_else(|| PluginError::InvalidPath(path.to_path_buf()))?;
    Ok(path.join("Contents").join("MacOS").join(stem))
}

/// Unix paths are arbitrary bytes; elsewhere they must be valid UTF-8.
/// Interior NULs are rejected on every platform.
fn path_to_cstring(path: &Path) -> Option<CString> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        CString::new(path.as_os_str().as_bytes()).ok()
    }
    #[cfg(not(unix))]
    {
        path.to_str().and_then(|p| CString::new(p).ok())
    }
}

/// A module whose entry table has been resolved and validated, but not
/// initialized.
pub struct LoadedModule {
    entry: ClapPluginEntry,
    path: PathBuf,
    // Dropped last: the entry's function pointers point into it.
    _library: Option<Library>,
}

impl LoadedModule {
    /// Map the module at `path` and resolve its `clap_entry` symbol.
    ///
    /// The path is canonicalized first, so a relative path resolves against
    /// the working directory and `init` receives the absolute location.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PluginError> {
        let requested = path.as_ref();
        let path = std::fs::canonicalize(requested)
            .map_err(|_| PluginError::InvalidPath(requested.to_path_buf()))?;
        let path = path.as_path();
        let binary = binary_path(path)?;

        unsafe {
            let library = Library::new(&binary)?;

            let entry = {
                let symbol: Symbol<*const ClapPluginEntry> = library
                    .get(CLAP_ENTRY_SYMBOL.to_bytes_with_nul())
                    .map_err(|_| PluginError::MissingSymbol)?;
                let entry = *symbol;
                if entry.is_null() {
                    return Err(PluginError::NullEntry);
                }
                *entry
            };

            tracing::debug!(path = %path.display(), version = %entry.clap_version, "resolved clap_entry");
            Self::validate(entry, path, Some(library))
        }
    }

    /// Use an entry table that is already part of this process.
    pub fn from_entry(entry: &ClapPluginEntry, path: impl Into<PathBuf>) -> Result<Self, PluginError> {
        let path: PathBuf = path.into();
        Self::validate(*entry, &path, None)
    }

    fn validate(
        entry: ClapPluginEntry,
        path: &Path,
        library: Option<Library>,
    ) -> Result<Self, PluginError> {
        // Nothing in the table may be called before the version is checked
        if !entry.clap_version.is_compatible() {
            return Err(PluginError::IncompatibleVersion {
                found: entry.clap_version,
            });
        }
        if entry.init.is_none() {
            return Err(PluginError::MissingFunction("init"));
        }
        if entry.deinit.is_none() {
            return Err(PluginError::MissingFunction("deinit"));
        }
        if entry.get_factory.is_none() {
            return Err(PluginError::MissingFunction("get_factory"));
        }

        Ok(Self {
            entry,
            path: path.to_path_buf(),
            _library: library,
        })
    }

    pub fn version(&self) -> ClapVersion {
        self.entry.clap_version
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reject modules declaring a dialect older than `required`
    pub fn require_version(self, required: ClapVersion) -> Result<Self, PluginError> {
        if self.version() < required {
            return Err(PluginError::VersionTooOld {
                found: self.version(),
                required,
            });
        }
        Ok(self)
    }

    /// Call `init` with the module's path.
    ///
    /// On failure the module is dropped without any further call into it.
    pub fn init(self) -> Result<InitializedModule, PluginError> {
        let path = path_to_cstring(&self.path)
            .ok_or_else(|| PluginError::InvalidPath(self.path.clone()))?;

        let Some(init) = self.entry.init else {
            return Err(PluginError::MissingFunction("init"));
        };

        if !unsafe { init(path.as_ptr()) } {
            tracing::warn!(path = %self.path.display(), "module init returned false");
            return Err(PluginError::InitFailed(self.path.clone()));
        }

        tracing::info!(path = %self.path.display(), version = %self.version(), "module initialized");
        Ok(InitializedModule {
            module: self,
            active: true,
        })
    }
}

/// A module between a successful `init` and its `deinit`.
///
/// Factory queries take `&self`, so the module can be shared across threads.
/// Dropping it runs `deinit` if [`InitializedModule::deinit`] was not called.
pub struct InitializedModule {
    module: LoadedModule,
    active: bool,
}

impl InitializedModule {
    pub fn version(&self) -> ClapVersion {
        self.module.version()
    }

    pub fn path(&self) -> &Path {
        self.module.path()
    }

    /// Factory registered under `factory_id`, if the module supports it.
    ///
    /// The pointer is owned by the module and valid until `deinit`.
    pub fn get_factory(&self, factory_id: &CStr) -> Option<NonNull<c_void>> {
        let get_factory = self.module.entry.get_factory?;
        NonNull::new(unsafe { get_factory(factory_id.as_ptr()) } as *mut c_void)
    }

    pub fn has_factory(&self, factory_id: &CStr) -> bool {
        self.get_factory(factory_id).is_some()
    }

    /// Call `deinit` and unload the module
    pub fn deinit(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if !std::mem::take(&mut self.active) {
            return;
        }
        if let Some(deinit) = self.module.entry.deinit {
            unsafe { deinit() };
        }
        tracing::debug!(path = %self.module.path.display(), "module deinitialized");
    }
}

impl Drop for InitializedModule {
    fn drop(&mut self) {
        self.shutdown();
    }
}
