use pakt_resolver::{DependencyGraph, Owner, PackageId, Target};
use pakt_utils::{get_module_path, is_node_modules_dir};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// Links are followed at most this many times while resolving.
const MAX_LINK_HOPS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LayoutEntry {
    /// A project directory; never moved or written by the linker.
    Project { importer: String },
    /// Package content imported from the store.
    Package {
        #[serde(serialize_with = "display")]
        id: PackageId,
        alias: String,
    },
    /// A symlink to an absolute target.
    Link { target: PathBuf },
}

impl LayoutEntry {
    #[must_use]
    pub const fn package_id(&self) -> Option<&PackageId> {
        match self {
            Self::Package { id, .. } => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedEntry {
    pub entry: LayoutEntry,
    /// Bindings directly under this entry's `node_modules`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, PathBuf>,
}

/// Every path the linker must produce, keyed by absolute path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayoutPlan {
    root: PathBuf,
    entries: BTreeMap<PathBuf, PlannedEntry>,
}

fn display<S: Serializer>(id: &PackageId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(id)
}

impl LayoutPlan {
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn entries(&self) -> &BTreeMap<PathBuf, PlannedEntry> {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&LayoutEntry> {
        self.entries.get(path).map(|planned| &planned.entry)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &LayoutEntry)> {
        self.entries
            .iter()
            .map(|(path, planned)| (path.as_path(), &planned.entry))
    }

    /// Package entries with their identity.
    pub fn packages(&self) -> impl Iterator<Item = (&Path, &PackageId)> {
        self.iter()
            .filter_map(|(path, entry)| entry.package_id().map(|id| (path, id)))
    }

    pub fn insert_project(&mut self, dir: &Path, importer: &str) {
        self.entries.insert(
            dir.to_path_buf(),
            PlannedEntry {
                entry: LayoutEntry::Project {
                    importer: importer.to_string(),
                },
                children: BTreeMap::new(),
            },
        );
    }

    /// Places `entry` at `<dir>/node_modules/<name>` and records it as a
    /// child of `dir` when `dir` is planned too. An occupied slot is kept.
    pub fn bind(&mut self, dir: &Path, name: &str, entry: LayoutEntry) -> PathBuf {
        let path = get_module_path(dir, name);
        if self.entries.contains_key(&path) {
            return path;
        }
        self.entries.insert(
            path.clone(),
            PlannedEntry {
                entry,
                children: BTreeMap::new(),
            },
        );
        if let Some(owner) = self.entries.get_mut(dir) {
            owner.children.insert(name.to_string(), path.clone());
        }
        path
    }

    /// Adds a standalone entry such as a bin link.
    pub fn insert_at(&mut self, path: PathBuf, entry: LayoutEntry) {
        self.entries.entry(path).or_insert(PlannedEntry {
            entry,
            children: BTreeMap::new(),
        });
    }

    /// Merges a plan computed for a disjoint part of the tree.
    pub fn merge(&mut self, other: Self) {
        for (path, planned) in other.entries {
            self.entries.entry(path).or_insert(planned);
        }
    }

    /// Resolves `name` required from the directory `from` the way the runtime
    /// does: nearest `node_modules` first, following links to the real entry.
    #[must_use]
    pub fn resolve(&self, from: &Path, name: &str) -> Option<(&Path, &LayoutEntry)> {
        let found = from
            .ancestors()
            .filter(|dir| !is_node_modules_dir(dir))
            .map(|dir| get_module_path(dir, name))
            .find_map(|candidate| self.entries.get_key_value(&candidate))?;
        self.follow(found.0.as_path(), &found.1.entry)
    }

    fn follow<'a>(
        &'a self,
        mut path: &'a Path,
        mut entry: &'a LayoutEntry,
    ) -> Option<(&'a Path, &'a LayoutEntry)> {
        for _ in 0..MAX_LINK_HOPS {
            let LayoutEntry::Link { target } = entry else {
                return Some((path, entry));
            };
            let (next_path, next) = self.entries.get_key_value(target)?;
            path = next_path.as_path();
            entry = &next.entry;
        }
        None
    }

    /// Checks that every planned project and package resolves each of its
    /// dependencies to the target the graph chose. Returns every mismatch.
    pub fn verify(&self, graph: &DependencyGraph) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        for (path, entry) in self.iter() {
            let owner = match entry {
                LayoutEntry::Project { importer } => match graph.importer_index(importer) {
                    Some(index) => Owner::Importer(index),
                    None => continue,
                },
                LayoutEntry::Package { id, .. } => Owner::Package(id.clone()),
                LayoutEntry::Link { .. } => continue,
            };

            for edge in graph.edges(&owner) {
                let resolved = self.resolve(path, &edge.spec.alias).map(|(_, entry)| entry);
                let ok = match (&edge.target, resolved) {
                    (Target::Package(id), Some(LayoutEntry::Package { id: found, .. })) => {
                        id == found
                    }
                    (Target::Workspace(id), Some(LayoutEntry::Project { importer })) => {
                        id == importer
                    }
                    _ => false,
                };
                if !ok {
                    problems.push(format!(
                        "{}: '{}' resolves to {}, expected {}",
                        path.display(),
                        edge.spec.alias,
                        describe(resolved),
                        describe_target(&edge.target)
                    ));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// Depth below the plan root, used to order parents before children.
    #[must_use]
    pub fn depth(&self, path: &Path) -> usize {
        path.strip_prefix(&self.root)
            .map_or_else(|_| path.components().count(), |rel| rel.components().count())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn describe(entry: Option<&LayoutEntry>) -> String {
    match entry {
        None => "nothing".to_string(),
        Some(LayoutEntry::Package { id, .. }) => id.to_string(),
        Some(LayoutEntry::Project { importer }) => format!("project {importer}"),
        Some(LayoutEntry::Link { target }) => format!("dangling link to {}", target.display()),
    }
}

fn describe_target(target: &Target) -> String {
    match target {
        Target::Package(id) => id.to_string(),
        Target::Workspace(id) => format!("project {id}"),
    }
}
