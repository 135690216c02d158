//! Module discovery and probing

use crate::loader::{LoadedModule, PluginError};
use clap_shim::ClapVersion;
use std::ffi::CString;
use std::fmt;
use std::path::{Path, PathBuf};

const CLAP_EXTENSION: &str = "clap";

/// Nested plugin folders deeper than this are ignored
const MAX_DEPTH: usize = 8;

fn is_clap(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case(CLAP_EXTENSION))
}

/// Every `.clap` module under `dirs`, sorted. A directory named `*.clap` is a
/// bundle and is returned without descending into it.
pub fn find_modules(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for dir in dirs {
        if !dir.is_dir() {
            tracing::debug!("Search path {:?} does not exist", dir);
            continue;
        }
        if let Err(e) = walk(dir, 0, &mut found) {
            tracing::warn!("Failed to scan {:?}: {}", dir, e);
        }
    }

    found.sort();
    found.dedup();
    found
}

fn walk(dir: &Path, depth: usize, found: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if depth > MAX_DEPTH {
        return Ok(());
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if is_clap(&path) {
            found.push(path);
        } else if path.is_dir() {
            if let Err(e) = walk(&path, depth + 1, found) {
                tracing::warn!("Failed to scan {:?}: {}", path, e);
            }
        }
    }

    Ok(())
}

/// Outcome of one load / init / query / deinit cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub path: PathBuf,
    pub version: ClapVersion,
    pub factories: Vec<(String, bool)>,
}

impl ProbeReport {
    pub fn supported(&self) -> impl Iterator<Item = &str> {
        self.factories
            .iter()
            .filter(|(_, supported)| *supported)
            .map(|(id, _)| id.as_str())
    }
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (CLAP {})", self.path.display(), self.version)?;
        for (id, supported) in &self.factories {
            writeln!(f, "  [{}] {}", if *supported { "x" } else { " " }, id)?;
        }
        Ok(())
    }
}

/// Run `module` through its whole lifecycle, querying each factory id
pub fn probe_module(
    module: LoadedModule,
    factory_ids: &[CString],
    min_version: Option<ClapVersion>,
) -> Result<ProbeReport, PluginError> {
    let module = match min_version {
        Some(required) => module.require_version(required)?,
        None => module,
    };

    let module = module.init()?;
    let factories = factory_ids
        .iter()
        .map(|id| (id.to_string_lossy().into_owned(), module.has_factory(id)))
        .collect();

    let report = ProbeReport {
        path: module.path().to_path_buf(),
        version: module.version(),
        factories,
    };
    module.deinit();

    Ok(report)
}

/// Load the module at `path` and probe it
pub fn probe(
    path: &Path,
    factory_ids: &[CString],
    min_version: Option<ClapVersion>,
) -> Result<ProbeReport, PluginError> {
    probe_module(LoadedModule::open(path)?, factory_ids, min_version)
}
