//! Realizes a [`LayoutPlan`] on disk.

mod state;

pub use state::{AppliedEntry, ModulesState, state_key};

use pakt_constants::{BIN_DIR, MAX_ATTEMPTS, TEMP_PREFIX};
use pakt_error::{PackageManagerError, Result};
use pakt_hoist::{LayoutEntry, LayoutPlan, LinkingStrategy};
use pakt_resolver::{DependencyGraph, PackageId};
use pakt_store::{ImportMethod, PackageLinker};
use pakt_utils::{get_module_path, get_node_modules_path, is_node_modules_dir};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::fetch::FetchedPackages;

/// What one link pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkReport {
    /// Package directories imported from the store.
    pub imported: usize,
    /// Imports that ended up as private copies.
    pub copied: usize,
    pub linked: usize,
    /// Entries that were already in place.
    pub verified: usize,
    /// Stale entries removed before linking.
    pub removed: usize,
    pub state_written: bool,
}

impl LinkReport {
    /// Filesystem writes the pass performed.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.imported + self.linked + self.removed + usize::from(self.state_written)
    }
}

enum Outcome {
    Verified,
    Imported(ImportMethod),
    Linked,
}

struct Planned<'a> {
    key: String,
    path: &'a Path,
    entry: &'a LayoutEntry,
    applied: AppliedEntry,
}

pub struct Linker {
    packages: FetchedPackages,
    copy_only: HashSet<PackageId>,
    import_method: ImportMethod,
    threads: usize,
    strategy: Option<LinkingStrategy>,
    cancel: CancellationToken,
    debug: bool,
}

impl Linker {
    /// Packages that need a build get a private copy instead of hard links.
    #[must_use]
    pub fn new(packages: FetchedPackages, graph: &DependencyGraph) -> Self {
        let copy_only = graph
            .packages
            .values()
            .filter(|node| node.package.requires_build)
            .map(|node| node.package.id.clone())
            .collect();
        Self {
            packages,
            copy_only,
            import_method: ImportMethod::Auto,
            threads: 1,
            strategy: None,
            cancel: CancellationToken::new(),
            debug: false,
        }
    }

    #[must_use]
    pub const fn import_method(mut self, method: ImportMethod) -> Self {
        self.import_method = method;
        self
    }

    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    #[must_use]
    pub const fn strategy(mut self, strategy: LinkingStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Applies `plan` under its root.
    ///
    /// Stale entries go first, then one depth level at a time. On failure or
    /// cancellation the entries applied so far are recorded in the state file.
    pub fn link(&self, plan: &LayoutPlan) -> Result<LinkReport> {
        let root = plan.root();
        let previous = ModulesState::load(root);
        let mut report = LinkReport::default();

        let mut levels: BTreeMap<usize, Vec<Planned<'_>>> = BTreeMap::new();
        let mut bin_targets: Vec<&Path> = Vec::new();
        let mut desired: BTreeMap<String, AppliedEntry> = BTreeMap::new();
        for (path, entry) in plan.iter() {
            let applied = match entry {
                LayoutEntry::Project { .. } => continue,
                LayoutEntry::Package { id, .. } => AppliedEntry::Package {
                    id: id.to_string(),
                    integrity: self
                        .packages
                        .get(id)
                        .map(|handle| handle.integrity().to_string())
                        .unwrap_or_default(),
                },
                LayoutEntry::Link { target } => AppliedEntry::Link {
                    target: state_key(root, target),
                },
            };
            let key = state_key(root, path);
            desired.insert(key.clone(), applied.clone());
            levels.entry(plan.depth(path)).or_default().push(Planned {
                key,
                path,
                entry,
                applied,
            });
        }

        let mut state = ModulesState {
            strategy: self.strategy.or(previous.strategy),
            entries: BTreeMap::new(),
        };
        report.removed = self.remove_stale(root, &previous, &desired, &mut state)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| PackageManagerError::IoError(e.to_string()))?;

        for (depth, level) in levels {
            if self.cancel.is_cancelled() {
                self.save_state(root, &state, &mut report);
                return Err(PackageManagerError::Cancelled);
            }
            pakt_logger::debug(
                &format!("Linking {} entries at depth {depth}", level.len()),
                self.debug,
            );

            let results: Vec<(&Planned<'_>, Result<Outcome>)> = pool.install(|| {
                level
                    .par_iter()
                    .map(|planned| (planned, self.apply(planned, previous.entries.get(&planned.key))))
                    .collect()
            });

            let mut failure = None;
            for (planned, result) in results {
                match result {
                    Ok(outcome) => {
                        match outcome {
                            Outcome::Verified => report.verified += 1,
                            Outcome::Linked => {
                                report.linked += 1;
                                if let LayoutEntry::Link { target } = planned.entry
                                    && is_bin_link(planned.path)
                                {
                                    bin_targets.push(target);
                                }
                            }
                            Outcome::Imported(method) => {
                                report.imported += 1;
                                if method == ImportMethod::Copy {
                                    report.copied += 1;
                                }
                            }
                        }
                        state.entries.insert(planned.key.clone(), planned.applied.clone());
                    }
                    Err(e) => {
                        state.entries.remove(&planned.key);
                        failure.get_or_insert(e);
                    }
                }
            }
            if let Some(e) = failure {
                self.save_state(root, &state, &mut report);
                return Err(e);
            }
        }

        // Bin targets may live at a deeper level than their link.
        for target in bin_targets {
            if let Err(e) = make_executable(target) {
                pakt_logger::debug(
                    &format!("Could not mark {} executable: {e}", target.display()),
                    self.debug,
                );
            }
        }

        self.save_state(root, &state, &mut report);
        Ok(report)
    }

    /// Deletes recorded entries the plan no longer wants, deepest first.
    /// Entries that stay unchanged are carried into `state`.
    fn remove_stale(
        &self,
        root: &Path,
        previous: &ModulesState,
        desired: &BTreeMap<String, AppliedEntry>,
        state: &mut ModulesState,
    ) -> Result<usize> {
        let mut stale: Vec<&String> = Vec::new();
        for (key, applied) in &previous.entries {
            if desired.get(key) == Some(applied) {
                state.entries.insert(key.clone(), applied.clone());
            } else {
                stale.push(key);
            }
        }
        stale.sort_by_key(|key| std::cmp::Reverse(key.matches('/').count()));

        let mut removed = 0;
        for key in stale {
            let path = root.join(key);
            if fs::symlink_metadata(&path).is_err() {
                continue;
            }
            PackageLinker::remove_path(&path).map_err(|e| {
                PackageManagerError::LinkingFailed(key.clone(), path.display().to_string(), e.to_string())
            })?;
            prune_empty_parents(&path, &get_node_modules_path(root));
            pakt_logger::debug(&format!("Removed stale {key}"), self.debug);
            removed += 1;
        }
        Ok(removed)
    }

    fn apply(&self, planned: &Planned<'_>, previous: Option<&AppliedEntry>) -> Result<Outcome> {
        if previous == Some(&planned.applied) && is_intact(planned.path, planned.entry) {
            return Ok(Outcome::Verified);
        }

        let label = match planned.entry {
            LayoutEntry::Package { id, .. } => id.to_string(),
            _ => planned.key.clone(),
        };
        let mut attempt = 1;
        loop {
            match self.materialize(planned.path, planned.entry) {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    pakt_logger::debug(
                        &format!("Retrying {label} at {} ({e})", planned.path.display()),
                        self.debug,
                    );
                    std::thread::sleep(Duration::from_millis(10 << attempt));
                    attempt += 1;
                }
                Err(e) => {
                    return Err(PackageManagerError::LinkingFailed(
                        label,
                        planned.path.display().to_string(),
                        e.to_string(),
                    ));
                }
            }
        }
    }

    fn materialize(&self, path: &Path, entry: &LayoutEntry) -> io::Result<Outcome> {
        match entry {
            LayoutEntry::Project { .. } => Ok(Outcome::Verified),
            LayoutEntry::Link { target } => {
                if PackageLinker::symlink_points_to(path, target) {
                    return Ok(Outcome::Verified);
                }
                PackageLinker::remove_path(path)?;
                PackageLinker::create_symlink(target, path)?;
                Ok(Outcome::Linked)
            }
            LayoutEntry::Package { id, .. } => {
                let handle = self
                    .packages
                    .get(id)
                    .ok_or_else(|| io::Error::other("package was not fetched"))?;
                let parent = path
                    .parent()
                    .ok_or_else(|| io::Error::other("entry has no parent directory"))?;
                fs::create_dir_all(parent)?;

                let staging = tempfile::Builder::new()
                    .prefix(TEMP_PREFIX)
                    .tempdir_in(parent)?;
                let staged = staging.path().join("package");
                let method = if self.copy_only.contains(id) {
                    ImportMethod::Copy
                } else {
                    self.import_method
                };
                let used = PackageLinker::import_package(&handle.package_dir(), &staged, method)?;

                PackageLinker::remove_path(path)?;
                fs::rename(&staged, path)?;
                Ok(Outcome::Imported(used))
            }
        }
    }

    fn save_state(&self, root: &Path, state: &ModulesState, report: &mut LinkReport) {
        match state.save(root) {
            Ok(written) => report.state_written = written,
            Err(e) => pakt_logger::warn(&format!("Could not record the modules state: {e}")),
        }
    }
}

fn is_intact(path: &Path, entry: &LayoutEntry) -> bool {
    match entry {
        LayoutEntry::Link { target } => PackageLinker::symlink_points_to(path, target),
        LayoutEntry::Package { .. } => fs::symlink_metadata(path).is_ok_and(|meta| meta.is_dir()),
        LayoutEntry::Project { .. } => true,
    }
}

/// Removes directories left empty below `stop`, walking up from `path`.
fn prune_empty_parents(path: &Path, stop: &Path) {
    for dir in path.ancestors().skip(1) {
        if dir == stop || !dir.starts_with(stop) || fs::remove_dir(dir).is_err() {
            break;
        }
    }
}

fn is_bin_link(path: &Path) -> bool {
    path.parent()
        .is_some_and(|dir| dir.file_name().is_some_and(|name| name == BIN_DIR))
}

#[cfg(unix)]
fn make_executable(target: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(target)?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(target, permissions)
}

#[cfg(not(unix))]
fn make_executable(_target: &Path) -> io::Result<()> {
    Ok(())
}

/// Where the runtime would load `name` from when required inside `from`.
///
/// Walks the real ancestors of `from` and returns the canonical path of the
/// first `node_modules/<name>` found.
#[must_use]
pub fn resolve_on_disk(from: &Path, name: &str) -> Option<PathBuf> {
    let start = fs::canonicalize(from).ok()?;
    start
        .ancestors()
        .filter(|dir| !is_node_modules_dir(dir))
        .map(|dir| get_module_path(dir, name))
        .find(|candidate| candidate.exists())
        .and_then(|found| fs::canonicalize(found).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::fetch_packages;
    use pakt_hoist::plan_layout;
    use pakt_registry::{MemoryIndex, PublishSpec};
    use pakt_resolver::{DependencyResolver, ImporterManifest, ResolveOptions};
    use pakt_store::StoreManager;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        index: MemoryIndex,
        store: StoreManager,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = fs::canonicalize(dir.path()).unwrap().join("ws");
            fs::create_dir_all(&root).unwrap();
            let store = StoreManager::new(dir.path().join("store"), true);
            let index = MemoryIndex::new();
            index.publish(PublishSpec::new("a", "1.0.0").dep("c", "^1.0.0")).unwrap();
            index.publish(PublishSpec::new("b", "1.0.0").dep("c", "^2.0.0")).unwrap();
            index.publish(PublishSpec::new("c", "1.0.0")).unwrap();
            index
                .publish(PublishSpec::new("c", "2.0.0").bin("c", "bin/c.js"))
                .unwrap();
            Self {
                _dir: dir,
                root,
                index,
                store,
            }
        }

        async fn link(&self, deps: &str, strategy: LinkingStrategy) -> Result<LinkReport> {
            let manifest = ImporterManifest {
                id: ".".into(),
                root_dir: self.root.clone(),
                manifest: serde_json::from_str(&format!(r#"{{"dependencies":{deps}}}"#)).unwrap(),
            };
            let graph = DependencyResolver::new(&self.index, None, ResolveOptions::default())
                .resolve(&[manifest])
                .await?
                .graph;
            let cancel = CancellationToken::new();
            let fetched = fetch_packages(&self.store, &self.index, &graph, 4, &cancel, false).await?;
            let plan = plan_layout(&graph, strategy, &self.root);
            Linker::new(fetched, &graph)
                .threads(2)
                .strategy(strategy)
                .link(&plan)
        }
    }

    #[tokio::test]
    async fn hoisted_tree_resolves_like_the_runtime() {
        let fx = Fixture::new();
        fx.link(r#"{"a":"^1.0.0","b":"^1.0.0"}"#, LinkingStrategy::Hoisted)
            .await
            .unwrap();

        let a = fx.root.join("node_modules/a");
        let b = fx.root.join("node_modules/b");
        assert!(a.join("package.json").is_file());
        assert_eq!(
            resolve_on_disk(&a, "c"),
            Some(fx.root.join("node_modules/c"))
        );
        assert_eq!(
            resolve_on_disk(&b, "c"),
            Some(b.join("node_modules/c"))
        );
        assert!(ModulesState::path(&fx.root).is_file());
    }

    #[tokio::test]
    async fn isolated_tree_links_into_the_virtual_store() {
        let fx = Fixture::new();
        fx.link(r#"{"a":"^1.0.0","b":"^1.0.0"}"#, LinkingStrategy::Isolated)
            .await
            .unwrap();

        let a = fx.root.join("node_modules/a");
        assert!(fs::symlink_metadata(&a).unwrap().file_type().is_symlink());
        let resolved_c = resolve_on_disk(&a, "c").unwrap();
        assert!(resolved_c.ends_with(".pakt/c@1.0.0/node_modules/c"));
        let from_b = resolve_on_disk(&fx.root.join("node_modules/b"), "c").unwrap();
        assert!(from_b.ends_with(".pakt/c@2.0.0/node_modules/c"));
        assert!(resolve_on_disk(&fx.root, "c").is_none());
    }

    #[tokio::test]
    async fn relinking_an_unchanged_plan_writes_nothing() {
        let fx = Fixture::new();
        let deps = r#"{"a":"^1.0.0","b":"^1.0.0"}"#;
        let first = fx.link(deps, LinkingStrategy::Hoisted).await.unwrap();
        assert!(first.writes() > 0);

        let second = fx.link(deps, LinkingStrategy::Hoisted).await.unwrap();
        assert_eq!(second.writes(), 0);
        assert_eq!(second.verified, first.imported + first.linked);
    }

    #[tokio::test]
    async fn dropped_entries_are_removed() {
        let fx = Fixture::new();
        fx.link(r#"{"a":"^1.0.0","b":"^1.0.0"}"#, LinkingStrategy::Hoisted)
            .await
            .unwrap();
        let report = fx.link(r#"{"a":"^1.0.0"}"#, LinkingStrategy::Hoisted).await.unwrap();

        assert_eq!(report.removed, 2);
        assert!(!fx.root.join("node_modules/b").exists());
        assert!(fx.root.join("node_modules/a").is_dir());
        assert!(fx.root.join("node_modules/c").is_dir());
    }

    #[tokio::test]
    async fn switching_layouts_replaces_the_tree() {
        let fx = Fixture::new();
        let deps = r#"{"b":"^1.0.0"}"#;
        fx.link(deps, LinkingStrategy::Isolated).await.unwrap();
        fx.link(deps, LinkingStrategy::Hoisted).await.unwrap();

        let b = fx.root.join("node_modules/b");
        assert!(fs::symlink_metadata(&b).unwrap().is_dir());
        assert!(!fx.root.join("node_modules/.pakt").join("b@1.0.0").exists());
        assert_eq!(resolve_on_disk(&b, "c"), Some(fx.root.join("node_modules/c")));
    }

    #[tokio::test]
    async fn bins_are_linked_and_executable() {
        let fx = Fixture::new();
        fx.link(r#"{"c":"^2.0.0"}"#, LinkingStrategy::Hoisted)
            .await
            .unwrap();
        let bin = fx.root.join("node_modules/.bin/c");
        assert!(fs::symlink_metadata(&bin).unwrap().file_type().is_symlink());
        assert!(fs::canonicalize(&bin).unwrap().ends_with("node_modules/c/bin/c.js"));
    }

    #[tokio::test]
    async fn unfetched_packages_fail_with_their_path() {
        let fx = Fixture::new();
        let manifest = ImporterManifest {
            id: ".".into(),
            root_dir: fx.root.clone(),
            manifest: serde_json::from_str(r#"{"dependencies":{"c":"1.0.0"}}"#).unwrap(),
        };
        let graph = DependencyResolver::new(&fx.index, None, ResolveOptions::default())
            .resolve(&[manifest])
            .await
            .unwrap()
            .graph;
        let plan = plan_layout(&graph, LinkingStrategy::Hoisted, &fx.root);

        let err = Linker::new(FetchedPackages::new(), &graph).link(&plan).unwrap_err();
        match err {
            PackageManagerError::LinkingFailed(package, path, _) => {
                assert_eq!(package, "c@1.0.0");
                assert!(path.ends_with("node_modules/c"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn cancellation_stops_between_levels() {
        let fx = Fixture::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let graph = DependencyGraph::default();
        let mut plan = LayoutPlan::new(&fx.root);
        plan.insert_project(&fx.root, ".");
        plan.bind(&fx.root, "x", LayoutEntry::Link {
            target: fx.root.join("elsewhere"),
        });

        let err = Linker::new(FetchedPackages::new(), &graph)
            .with_cancellation(cancel)
            .link(&plan)
            .unwrap_err();
        assert!(matches!(err, PackageManagerError::Cancelled));
        assert!(!fx.root.join("node_modules/x").exists());
    }
}
