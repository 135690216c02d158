//! Configuration file management.
//!
//! Handles loading probe preferences from `~/.clap-probe.toml`.

use clap_shim::{factory_ids, ClapVersion};
use serde::{Deserialize, Serialize};
use std::ffi::{CString, OsString};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_TEMPLATE: &str = r#"# clap-probe configuration file

# Extra directories scanned for .clap modules, before the standard locations
# (CLAP_PATH, then the platform's per-user and system-wide CLAP folders)
# search_paths = ["/opt/plugins/clap"]

# Factory identifiers queried on every module (default: all well-known ids)
# factory_ids = [
#   "clap.plugin-factory",
#   "clap.preset-discovery-factory/2",
#   "clap.plugin-invalidation-factory/1",
#   "clap.plugin-state-converter-factory/1",
# ]

# Reject modules declaring an older CLAP version than this
# min_version = "1.0.0"
"#;

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
    pub search_paths: Option<Vec<PathBuf>>,
    pub factory_ids: Option<Vec<String>>,
    pub min_version: Option<String>,
}

impl Config {
    fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".clap-probe.toml"))
    }

    pub fn load() -> Self {
        let path = match Self::path() {
            Some(p) => p,
            None => return Self::default(),
        };

        // Create template file if it doesn't exist
        if !path.exists() {
            match fs::write(&path, CONFIG_TEMPLATE) {
                Ok(()) => tracing::info!("Created config template at {:?}", path),
                Err(e) => tracing::warn!("Could not write config template {:?}: {}", path, e),
            }
        }

        Self::load_from(&path)
    }

    /// Read `path`, falling back to defaults if it is missing or malformed
    pub fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("No config at {:?}: {}", path, e);
                return Self::default();
            }
        };

        toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
            Self::default()
        })
    }

    /// Configured directories followed by the standard CLAP locations
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.search_paths.clone().unwrap_or_default();
        for path in default_search_paths(
            std::env::var_os("CLAP_PATH"),
            dirs::home_dir(),
            platform_dirs(),
        ) {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }

    /// Factory ids to query, as C strings. Ids with interior NULs are skipped.
    pub fn factory_ids(&self) -> Vec<CString> {
        match &self.factory_ids {
            Some(ids) => ids
                .iter()
                .filter_map(|id| match CString::new(id.as_str()) {
                    Ok(id) => Some(id),
                    Err(_) => {
                        tracing::warn!("Skipping factory id with a NUL byte: {:?}", id);
                        None
                    }
                })
                .collect(),
            None => factory_ids::ALL.iter().map(|id| (*id).to_owned()).collect(),
        }
    }

    pub fn min_version(&self) -> Option<ClapVersion> {
        let raw = self.min_version.as_deref()?;
        match raw.parse() {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::warn!("Ignoring min_version: {}", e);
                None
            }
        }
    }
}

/// Per-user entries are relative to the home directory
#[derive(Debug, Default)]
pub struct PlatformDirs {
    pub user: Vec<PathBuf>,
    pub system: Vec<PathBuf>,
}

fn platform_dirs() -> PlatformDirs {
    if cfg!(target_os = "macos") {
        PlatformDirs {
            user: vec![PathBuf::from("Library/Audio/Plug-Ins/CLAP")],
            system: vec![PathBuf::from("/Library/Audio/Plug-Ins/CLAP")],
        }
    } else if cfg!(target_os = "windows") {
        let mut system = Vec::new();
        if let Some(common) = std::env::var_os("COMMONPROGRAMFILES") {
            system.push(PathBuf::from(common).join("CLAP"));
        }
        if let Some(local) = dirs::data_local_dir() {
            system.push(local.join("Programs").join("Common").join("CLAP"));
        }
        PlatformDirs {
            user: Vec::new(),
            system,
        }
    } else {
        PlatformDirs {
            user: vec![PathBuf::from(".clap")],
            system: vec![PathBuf::from("/usr/lib/clap")],
        }
    }
}

/// `CLAP_PATH` entries first, then per-user, then system-wide directories
pub fn default_search_paths(
    clap_path: Option<OsString>,
    home: Option<PathBuf>,
    platform: PlatformDirs,
) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = clap_path
        .map(|value| {
            std::env::split_paths(&value)
                .filter(|p| !p.as_os_str().is_empty())
                .collect()
        })
        .unwrap_or_default();

    if let Some(home) = home {
        paths.extend(platform.user.iter().map(|dir| home.join(dir)));
    }
    paths.extend(platform.system);

    paths
}
