use pakt_error::PackageManagerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the `node_modules` tree is laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkingStrategy {
    /// Flattened tree; duplicates nest under their requirer.
    Hoisted,
    /// Virtual store with one directory per identity, wired with symlinks.
    #[default]
    Isolated,
}

impl LinkingStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hoisted => "hoisted",
            Self::Isolated => "isolated",
        }
    }
}

impl fmt::Display for LinkingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkingStrategy {
    type Err = PackageManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hoisted" => Ok(Self::Hoisted),
            "isolated" => Ok(Self::Isolated),
            other => Err(PackageManagerError::InvalidPackageSpec(format!(
                "unknown node linker '{other}' (expected 'hoisted' or 'isolated')"
            ))),
        }
    }
}
