use indexmap::IndexMap;
use pakt_constants::SETTINGS_KEY;
use serde::{Deserialize, Serialize};

use crate::settings::Settings;

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct PackageJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scripts: Option<IndexMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<IndexMap<String, String>>,
    #[serde(rename = "devDependencies", skip_serializing_if = "Option::is_none")]
    pub dev_dependencies: Option<IndexMap<String, String>>,
    #[serde(rename = "peerDependencies", skip_serializing_if = "Option::is_none")]
    pub peer_dependencies: Option<IndexMap<String, String>>,
    #[serde(
        rename = "optionalDependencies",
        skip_serializing_if = "Option::is_none"
    )]
    pub optional_dependencies: Option<IndexMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engines: Option<IndexMap<String, String>>,
    // Catch-all for other fields to preserve them
    #[serde(flatten)]
    pub other: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyType {
    Dependencies,
    DevDependencies,
    PeerDependencies,
    OptionalDependencies,
}

impl DependencyType {
    /// Fields an importer installs from, in the order they are merged.
    pub const INSTALLED: [Self; 3] = [
        Self::Dependencies,
        Self::OptionalDependencies,
        Self::DevDependencies,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies",
            Self::DevDependencies => "devDependencies",
            Self::PeerDependencies => "peerDependencies",
            Self::OptionalDependencies => "optionalDependencies",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "dependencies" => Some(Self::Dependencies),
            "devDependencies" => Some(Self::DevDependencies),
            "peerDependencies" => Some(Self::PeerDependencies),
            "optionalDependencies" => Some(Self::OptionalDependencies),
            _ => None,
        }
    }
}

impl PackageJson {
    #[must_use]
    pub const fn field(&self, dep_type: DependencyType) -> Option<&IndexMap<String, String>> {
        match dep_type {
            DependencyType::Dependencies => self.dependencies.as_ref(),
            DependencyType::DevDependencies => self.dev_dependencies.as_ref(),
            DependencyType::PeerDependencies => self.peer_dependencies.as_ref(),
            DependencyType::OptionalDependencies => self.optional_dependencies.as_ref(),
        }
    }

    pub const fn field_mut(
        &mut self,
        dep_type: DependencyType,
    ) -> &mut Option<IndexMap<String, String>> {
        match dep_type {
            DependencyType::Dependencies => &mut self.dependencies,
            DependencyType::DevDependencies => &mut self.dev_dependencies,
            DependencyType::PeerDependencies => &mut self.peer_dependencies,
            DependencyType::OptionalDependencies => &mut self.optional_dependencies,
        }
    }

    /// Dependencies the importer installs, as `(field, alias, specifier)` in merge order.
    ///
    /// `dev_dependencies` is skipped in production installs.
    #[must_use]
    pub fn installable_dependencies(&self, production: bool) -> Vec<(DependencyType, &str, &str)> {
        DependencyType::INSTALLED
            .iter()
            .filter(|field| !(production && **field == DependencyType::DevDependencies))
            .filter_map(|field| self.field(*field).map(|deps| (*field, deps)))
            .flat_map(|(field, deps)| {
                deps.iter()
                    .map(move |(name, spec)| (field, name.as_str(), spec.as_str()))
            })
            .collect()
    }

    /// The `"pakt"` settings object, if present and well-formed.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        match self.other.get(SETTINGS_KEY) {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Ok(Settings::default()),
        }
    }

    #[must_use]
    pub fn engine(&self, name: &str) -> Option<&str> {
        self.engines
            .as_ref()
            .and_then(|engines| engines.get(name))
            .map(String::as_str)
    }
}
