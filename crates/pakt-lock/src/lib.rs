//! On-disk lockfile schema.
//!
//! Top-level maps are `BTreeMap`s so the file is byte-stable; each package's
//! own maps keep the package's declaration order.

use indexmap::IndexMap;
use pakt_constants::LOCKFILE_VERSION;
use pakt_error::{PackageManagerError, Result};
use pakt_hoist::LinkingStrategy;
use pakt_utils::write_if_changed;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

/// Prefix of a version reference pointing at a workspace project.
pub const LINK_PREFIX: &str = "link:";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LockSettings {
    pub node_linker: LinkingStrategy,
    #[serde(default)]
    pub engine_strict: bool,
}

/// One declared dependency: the specifier as written and what it resolved to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LockDependency {
    pub specifier: String,
    /// `1.2.3`, `real-name@1.2.3` for aliases, or `link:<importer>`.
    /// Absent for a skipped optional dependency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Declared under `optionalDependencies` of a package.
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
}

impl LockDependency {
    #[must_use]
    pub fn new(specifier: &str, version: Option<String>) -> Self {
        Self {
            specifier: specifier.to_string(),
            version,
            optional: false,
        }
    }

    #[must_use]
    pub const fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LockImporter {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, LockDependency>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub optional_dependencies: BTreeMap<String, LockDependency>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dev_dependencies: BTreeMap<String, LockDependency>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LockPackage {
    pub integrity: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tarball: String,
    /// Regular and optional dependencies in the order the package declares
    /// them once merged.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub dependencies: IndexMap<String, LockDependency>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub peer_dependencies: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional_peers: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub engines: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub os: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cpu: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub bin: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub requires_build: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    pub lockfile_version: u32,
    pub settings: LockSettings,
    /// `engines` of the root manifest.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub engines: IndexMap<String, String>,
    pub importers: BTreeMap<String, LockImporter>,
    #[serde(default)]
    pub packages: BTreeMap<String, LockPackage>,
}

impl Lockfile {
    #[must_use]
    pub fn new(settings: LockSettings) -> Self {
        Self {
            lockfile_version: LOCKFILE_VERSION,
            settings,
            engines: IndexMap::new(),
            importers: BTreeMap::new(),
            packages: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn package_key(name: &str, version: &str) -> String {
        format!("{name}@{version}")
    }

    /// Reads a lockfile; a missing file is `None`.
    pub fn read_from(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PackageManagerError::LockfileError(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let lockfile = Self::from_json(&content)?;
        if lockfile.lockfile_version != LOCKFILE_VERSION {
            return Err(PackageManagerError::LockfileError(format!(
                "lockfile version {} is not supported (expected {LOCKFILE_VERSION})",
                lockfile.lockfile_version
            )));
        }
        Ok(Some(lockfile))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PackageManagerError::LockfileError(format!("invalid lockfile JSON: {e}")))
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|e| PackageManagerError::LockfileError(e.to_string()))?;
        json.push('\n');
        Ok(json)
    }

    /// Writes atomically; returns `false` when the file already matched.
    pub fn write_to(&self, path: &Path) -> Result<bool> {
        let json = self.to_json()?;
        write_if_changed(path, json.as_bytes()).map_err(|e| {
            PackageManagerError::LockfileError(format!("failed to write {}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Lockfile {
        let mut lockfile = Lockfile::new(LockSettings {
            node_linker: LinkingStrategy::Hoisted,
            engine_strict: true,
        });
        let mut root = LockImporter::default();
        root.dependencies.insert(
            "lodash3".into(),
            LockDependency::new("npm:lodash@^3", Some("lodash@3.10.1".into())),
        );
        root.dependencies
            .insert("a".into(), LockDependency::new("^1.0.0", Some("1.0.0".into())));
        lockfile.importers.insert(".".into(), root);

        let mut dependencies = IndexMap::new();
        dependencies.insert("z".into(), LockDependency::new("^1", Some("1.0.0".into())));
        dependencies.insert(
            "b".into(),
            LockDependency::new("^2", Some("2.0.0".into())).optional(true),
        );
        lockfile.packages.insert(
            Lockfile::package_key("a", "1.0.0"),
            LockPackage {
                integrity: "sha512-abc".into(),
                tarball: String::new(),
                dependencies,
                peer_dependencies: IndexMap::new(),
                optional_peers: Vec::new(),
                engines: IndexMap::new(),
                os: Vec::new(),
                cpu: Vec::new(),
                bin: IndexMap::new(),
                requires_build: false,
            },
        );
        lockfile
    }

    #[test]
    fn serialization_is_sorted_at_the_top_and_ordered_per_package() {
        let json = sample().to_json().unwrap();
        assert!(json.find("\"a\"").unwrap() < json.find("\"lodash3\"").unwrap());
        assert!(json.find("\"z\"").unwrap() < json.find("\"b\"").unwrap());
        assert!(json.contains("\"nodeLinker\": \"hoisted\""));
        assert!(!json.contains("requiresBuild"));
        assert_eq!(json.matches("\"optional\": true").count(), 1);
        assert!(json.ends_with("}\n"));
        assert_eq!(Lockfile::from_json(&json).unwrap(), sample());
    }

    #[test]
    fn missing_file_reads_as_none_and_unchanged_writes_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pakt-lock.json");
        assert!(Lockfile::read_from(&path).unwrap().is_none());

        assert!(sample().write_to(&path).unwrap());
        assert!(!sample().write_to(&path).unwrap());
        assert_eq!(Lockfile::read_from(&path).unwrap(), Some(sample()));
    }

    #[test]
    fn unsupported_versions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pakt-lock.json");
        let mut lockfile = sample();
        lockfile.lockfile_version = 99;
        fs::write(&path, lockfile.to_json().unwrap()).unwrap();
        assert!(matches!(
            Lockfile::read_from(&path),
            Err(PackageManagerError::LockfileError(_))
        ));
    }
}
