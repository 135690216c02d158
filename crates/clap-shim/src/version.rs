//! ABI version triple helpers

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::ClapVersion;

/// The dialect this crate's entry tables declare.
pub const CLAP_VERSION: ClapVersion = ClapVersion::new(1, 2, 2);

impl ClapVersion {
    pub const fn new(major: u32, minor: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            revision,
        }
    }

    /// Host-side ABI check, run before touching any function pointer.
    ///
    /// Every 1.x dialect shares the entry table layout. 0.x were drafts.
    pub const fn is_compatible(&self) -> bool {
        self.major >= 1
    }
}

impl Default for ClapVersion {
    fn default() -> Self {
        CLAP_VERSION
    }
}

impl fmt::Display for ClapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("expected `major.minor.revision`, got {0:?}")]
    Malformed(String),
    #[error("invalid version component {0:?}")]
    InvalidComponent(String),
}

impl FromStr for ClapVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(VersionParseError::Malformed(s.to_string()));
        }

        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| VersionParseError::InvalidComponent(part.to_string()))
        };

        Ok(Self::new(parse(parts[0])?, parse(parts[1])?, parse(parts[2])?))
    }
}
