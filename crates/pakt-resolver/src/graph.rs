use indexmap::IndexMap;
use pakt_error::PackageManagerError;
use pakt_project::DependencyType;
use pakt_store::Integrity;
use pakt_utils::split_name_version;
use semver::Version;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::semver_range::VersionRange;

/// Real package name plus exact version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId {
    pub name: String,
    pub version: Version,
}

impl PackageId {
    #[must_use]
    pub fn new(name: &str, version: Version) -> Self {
        Self {
            name: name.to_string(),
            version,
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl FromStr for PackageId {
    type Err = PackageManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match split_name_version(s) {
            (name, Some(version)) if !name.is_empty() => Ok(Self {
                name: name.to_string(),
                version: Version::parse(version)
                    .map_err(|e| PackageManagerError::InvalidPackageSpec(format!("{s}: {e}")))?,
            }),
            _ => Err(PackageManagerError::InvalidPackageSpec(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    Range(VersionRange),
    Tag(String),
    /// Text after `workspace:` (`*`, `^`, `~` or a range).
    Workspace(String),
}

/// One dependency as declared by an importer or a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    /// Name the dependency is required by.
    pub alias: String,
    /// Real package name; differs from `alias` for `npm:` aliases.
    pub name: String,
    pub constraint: VersionConstraint,
    /// Specifier exactly as written.
    pub raw: String,
    pub field: DependencyType,
}

impl DependencySpec {
    #[must_use]
    pub fn is_aliased(&self) -> bool {
        self.alias != self.name
    }

    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.field == DependencyType::OptionalDependencies
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSpec {
    pub name: String,
    pub range: String,
    pub optional: bool,
}

/// A package pinned to one version. Shared read-only through `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    pub id: PackageId,
    pub integrity: Integrity,
    pub tarball: String,
    /// `dependencies` then `optionalDependencies`, in declaration order.
    pub dependencies: Vec<DependencySpec>,
    pub peers: Vec<PeerSpec>,
    pub engines: IndexMap<String, String>,
    pub os: Vec<String>,
    pub cpu: Vec<String>,
    pub bin: IndexMap<String, String>,
    pub requires_build: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    Package(PackageId),
    /// A local project, by importer id.
    Workspace(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub spec: DependencySpec,
    pub target: Target,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphPackage {
    pub package: Arc<ResolvedPackage>,
    /// Resolved dependencies in declaration order; skipped optionals are absent.
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Importer {
    /// Path relative to the workspace root with `/` separators; `.` for the root.
    pub id: String,
    pub root_dir: PathBuf,
    pub name: Option<String>,
    pub version: Option<Version>,
    pub edges: Vec<Edge>,
}

/// Who owns a list of edges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Owner {
    Importer(usize),
    Package(PackageId),
}

/// Importers plus an arena of packages keyed by identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    pub importers: Vec<Importer>,
    pub packages: BTreeMap<PackageId, GraphPackage>,
}

impl DependencyGraph {
    #[must_use]
    pub fn importer(&self, id: &str) -> Option<&Importer> {
        self.importers.iter().find(|i| i.id == id)
    }

    #[must_use]
    pub fn importer_index(&self, id: &str) -> Option<usize> {
        self.importers.iter().position(|i| i.id == id)
    }

    #[must_use]
    pub fn package(&self, id: &PackageId) -> Option<&GraphPackage> {
        self.packages.get(id)
    }

    #[must_use]
    pub fn edges(&self, owner: &Owner) -> &[Edge] {
        match owner {
            Owner::Importer(index) => self
                .importers
                .get(*index)
                .map_or(&[][..], |i| i.edges.as_slice()),
            Owner::Package(id) => self
                .packages
                .get(id)
                .map_or(&[][..], |p| p.edges.as_slice()),
        }
    }

    /// Every version of `name` present in the graph.
    pub fn versions_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Version> + 'a {
        self.packages
            .keys()
            .filter(move |id| id.name == name)
            .map(|id| &id.version)
    }

    /// Drops packages no importer can reach. Returns how many were removed.
    pub fn retain_reachable(&mut self) -> usize {
        let mut reachable: BTreeSet<PackageId> = BTreeSet::new();
        let mut queue: VecDeque<&PackageId> = self
            .importers
            .iter()
            .flat_map(|i| i.edges.iter())
            .filter_map(|e| match &e.target {
                Target::Package(id) => Some(id),
                Target::Workspace(_) => None,
            })
            .collect();

        while let Some(id) = queue.pop_front() {
            if !reachable.insert(id.clone()) {
                continue;
            }
            if let Some(pkg) = self.packages.get(id) {
                queue.extend(pkg.edges.iter().filter_map(|e| match &e.target {
                    Target::Package(id) => Some(id),
                    Target::Workspace(_) => None,
                }));
            }
        }

        let before = self.packages.len();
        self.packages.retain(|id, _| reachable.contains(id));
        before - self.packages.len()
    }
}
