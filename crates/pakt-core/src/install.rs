use pakt_constants::DEFAULT_TAG;
use pakt_error::{PackageManagerError, Result};
use pakt_hoist::plan_layout;
use pakt_lock::{LockSettings, Lockfile};
use pakt_project::{DependencyManager, DependencyType, PackageJson, write_package_json};
use pakt_registry::{HttpIndexClient, IndexClient, PackageMetadata, Tarball};
use pakt_resolver::{
    DependencyGraph, DependencyResolver, DependencySpec, EngineContext, ImporterManifest,
    Resolution, ResolveOptions, Target, UpdateSet, VersionRange,
};
use pakt_store::StoreManager;
use pakt_utils::{
    get_lock_file_path, is_valid_package_name, parse_npm_alias, parse_package_spec,
    split_name_version,
};
use std::collections::BTreeSet;
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::fetch::fetch_packages;
use crate::linker::{LinkReport, Linker};
use crate::lockfile::{divergences, graph_to_lockfile, lockfile_to_graph};
use crate::options::{EffectiveConfig, InstallOptions};
use crate::workspace::{load_importers, root_manifest};

/// Outcome of one install, add, remove or update.
#[derive(Debug, Clone)]
pub struct InstallReport {
    /// Full graph, dev dependencies included, as written to the lockfile.
    pub graph: DependencyGraph,
    /// Packages laid out in `node_modules`.
    pub installed: usize,
    /// Store entries extracted by this run.
    pub extracted: usize,
    pub link: LinkReport,
    pub lockfile_written: bool,
    /// Engine, platform, optional and peer issues that did not fail the install.
    pub warnings: Vec<String>,
}

impl InstallReport {
    #[must_use]
    pub fn summary(&self) -> String {
        let reused = self.installed.saturating_sub(self.extracted);
        format!(
            "Installed {} packages ({} fetched, {} from store)",
            self.installed, self.extracted, reused
        )
    }
}

/// A manifest specifier to rewrite once its version is known.
#[derive(Debug, Clone)]
struct PendingSave {
    importer: usize,
    alias: String,
    /// Written verbatim when present.
    requested: Option<String>,
    alias_target: Option<String>,
    field: DependencyType,
}

#[derive(Debug, Default)]
struct Change {
    update: UpdateSet,
    saves: Vec<PendingSave>,
    /// Importers whose manifests must be written back.
    edited: BTreeSet<usize>,
}

impl Change {
    /// Why a frozen lockfile cannot take this change when the edited
    /// manifests still match it.
    fn frozen_reasons(&self) -> Vec<String> {
        match &self.update {
            UpdateSet::None => Vec::new(),
            UpdateSet::All => vec!["updating every package rewrites the lockfile".to_string()],
            UpdateSet::Names(names) => names
                .iter()
                .map(|name| format!("updating '{name}' rewrites the lockfile"))
                .collect(),
        }
    }
}

/// Index wrapper for frozen installs: tarballs only, never metadata.
struct FrozenIndex<'a, C>(&'a C);

impl<C: IndexClient> IndexClient for FrozenIndex<'_, C> {
    async fn package_metadata(&self, name: &str) -> Result<PackageMetadata> {
        Err(PackageManagerError::LockfileDivergence(vec![format!(
            "'{name}' is not locked"
        )]))
    }

    async fn fetch_tarball(&self, name: &str, version: &str, url: &str) -> Result<Tarball> {
        self.0.fetch_tarball(name, version, url).await
    }
}

pub struct InstallManager<C: IndexClient = HttpIndexClient> {
    options: InstallOptions,
    index: C,
    cancel: CancellationToken,
}

impl InstallManager<HttpIndexClient> {
    #[must_use]
    pub fn new(options: InstallOptions) -> Self {
        let index = HttpIndexClient::new(&options.registry);
        Self::with_index(options, index)
    }
}

impl<C: IndexClient> InstallManager<C> {
    pub fn with_index(options: InstallOptions, index: C) -> Self {
        Self {
            options,
            index,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub const fn options(&self) -> &InstallOptions {
        &self.options
    }

    pub const fn index(&self) -> &C {
        &self.index
    }

    /// Installs every importer as declared.
    pub async fn install(&self) -> Result<InstallReport> {
        let importers = self.load()?;
        self.run(importers, Change::default()).await
    }

    /// Adds `specs` (`name`, `name@range`, `alias@npm:real@range`) to the
    /// target project and installs.
    pub async fn add(&self, specs: &[String]) -> Result<InstallReport> {
        let mut importers = self.load()?;
        let target = self.target_index(&importers)?;
        let field = self.options.dependency_type;
        let mut change = Change::default();

        let manifest = importer_manifest(&mut importers, target)?;
        for raw in specs {
            let (alias, version) = parse_package_spec(raw);
            if !is_valid_package_name(&alias) {
                return Err(PackageManagerError::InvalidPackageSpec(raw.clone()));
            }
            let (specifier, requested, alias_target) = add_specifier(version)?;
            DependencyManager::add_dependency(manifest, &alias, &specifier, field);
            change.saves.push(PendingSave {
                importer: target,
                alias,
                requested,
                alias_target,
                field,
            });
        }
        change.edited.insert(target);
        self.run(importers, change).await
    }

    /// Removes `names` from the target project and reinstalls.
    pub async fn remove(&self, names: &[String]) -> Result<InstallReport> {
        let mut importers = self.load()?;
        let target = self.target_index(&importers)?;
        let id = importers
            .get(target)
            .map(|importer| importer.id.clone())
            .unwrap_or_default();
        let manifest = importer_manifest(&mut importers, target)?;
        for name in names {
            if DependencyManager::remove_dependency(manifest, name).is_empty() {
                return Err(PackageManagerError::PackageJsonError(format!(
                    "'{name}' is not a dependency of {id}"
                )));
            }
        }

        let change = Change {
            edited: BTreeSet::from([target]),
            ..Change::default()
        };
        self.run(importers, change).await
    }

    /// Re-resolves `names` (every package when empty) ignoring locked versions.
    ///
    /// With `latest`, the target project's matching direct dependencies move
    /// to the `latest` tag and are saved with the configured prefix.
    pub async fn update(&self, names: &[String], latest: bool) -> Result<InstallReport> {
        let mut importers = self.load()?;
        let mut change = Change {
            update: if names.is_empty() {
                UpdateSet::All
            } else {
                UpdateSet::Names(names.iter().cloned().collect())
            },
            ..Change::default()
        };

        if latest {
            let target = self.target_index(&importers)?;
            let manifest = importer_manifest(&mut importers, target)?;
            let mut extra = BTreeSet::new();
            for (field, alias, raw) in owned_entries(manifest) {
                if !(names.is_empty() || names.contains(&alias)) || raw.starts_with("workspace:") {
                    continue;
                }
                let alias_target = parse_npm_alias(&raw).map(|(real, _)| real);
                let specifier = match &alias_target {
                    Some(real) => {
                        extra.insert(real.clone());
                        format!("npm:{real}@{DEFAULT_TAG}")
                    }
                    None => DEFAULT_TAG.to_string(),
                };
                DependencyManager::add_dependency(manifest, &alias, &specifier, field);
                change.saves.push(PendingSave {
                    importer: target,
                    alias,
                    requested: None,
                    alias_target,
                    field,
                });
            }
            if let UpdateSet::Names(set) = &mut change.update {
                set.extend(extra);
            }
            change.edited.insert(target);
        }

        self.run(importers, change).await
    }

    fn workspace_dir(&self) -> Result<PathBuf> {
        fs::canonicalize(&self.options.workspace_dir).map_err(|e| {
            PackageManagerError::IoError(format!(
                "{}: {e}",
                self.options.workspace_dir.display()
            ))
        })
    }

    fn load(&self) -> Result<Vec<ImporterManifest>> {
        load_importers(&self.workspace_dir()?, &self.options.roots())
    }

    fn target_index(&self, importers: &[ImporterManifest]) -> Result<usize> {
        let workspace = self.workspace_dir()?;
        let target = fs::canonicalize(workspace.join(self.options.target()))?;
        importers
            .iter()
            .position(|importer| importer.root_dir == target)
            .ok_or_else(|| {
                PackageManagerError::PackageJsonError(format!(
                    "project {} is not part of this install",
                    target.display()
                ))
            })
    }

    fn check_cancel(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(PackageManagerError::Cancelled);
        }
        Ok(())
    }

    async fn resolve_with<I: IndexClient>(
        &self,
        index: &I,
        prior: Option<&DependencyGraph>,
        options: ResolveOptions,
        importers: &[ImporterManifest],
    ) -> Result<Resolution> {
        DependencyResolver::new(index, prior, options)
            .with_cancellation(self.cancel.clone())
            .resolve(importers)
            .await
    }

    async fn run(&self, mut importers: Vec<ImporterManifest>, change: Change) -> Result<InstallReport> {
        let started = Instant::now();
        let options = &self.options;
        let workspace = self.workspace_dir()?;
        let settings = root_manifest(&importers)
            .map(PackageJson::settings)
            .transpose()?
            .unwrap_or_default();
        let config = options.effective(&settings)?;
        let lock_path = get_lock_file_path(&workspace);

        if options.frozen_lockfile && !options.use_lockfile {
            return Err(PackageManagerError::LockfileError(
                "a frozen lockfile cannot be combined with disabling the lockfile".to_string(),
            ));
        }
        let lockfile = if options.use_lockfile {
            Lockfile::read_from(&lock_path)?
        } else {
            None
        };
        if options.frozen_lockfile {
            let mut reasons = divergences(lockfile.as_ref(), &importers, config.strategy)?;
            if reasons.is_empty() {
                reasons = change.frozen_reasons();
            }
            if !reasons.is_empty() {
                return Err(PackageManagerError::LockfileDivergence(reasons));
            }
        }
        let prior = lockfile
            .as_ref()
            .map(|lockfile| lockfile_to_graph(lockfile, &importers))
            .transpose()?;

        pakt_logger::status("Resolving dependencies...");
        let resolve_options = ResolveOptions {
            engine_strict: config.engine_strict,
            engines: EngineContext {
                node_version: config.node_version.clone(),
                ..EngineContext::default()
            },
            update: change.update.clone(),
            production: false,
            concurrency: config.limits.resolution,
            debug: options.debug,
        };
        let phase = Instant::now();
        let Resolution {
            mut graph,
            warnings,
        } = if options.frozen_lockfile {
            let frozen = FrozenIndex(&self.index);
            self.resolve_with(&frozen, prior.as_ref(), resolve_options, &importers)
                .await?
        } else {
            self.resolve_with(&self.index, prior.as_ref(), resolve_options, &importers)
                .await?
        };
        pakt_logger::phase("Resolution", phase, options.debug);
        self.check_cancel()?;

        for save in &change.saves {
            apply_save(save, &mut importers, &mut graph, &config)?;
        }

        let layout_graph = if options.production {
            without_dev_dependencies(&graph)
        } else {
            graph.clone()
        };

        pakt_logger::status(&format!("Fetching {} packages...", layout_graph.packages.len()));
        let phase = Instant::now();
        let store = StoreManager::new(&config.store_dir, config.verify_store_integrity);
        let fetched = fetch_packages(
            &store,
            &self.index,
            &layout_graph,
            config.limits.fetch,
            &self.cancel,
            options.debug,
        )
        .await?;
        pakt_logger::phase("Fetch", phase, options.debug);
        self.check_cancel()?;

        pakt_logger::status("Linking packages...");
        let phase = Instant::now();
        let plan = plan_layout(&layout_graph, config.strategy, &workspace);
        let linker = Linker::new(fetched, &layout_graph)
            .import_method(config.import_method)
            .threads(config.limits.link)
            .strategy(config.strategy)
            .with_cancellation(self.cancel.clone())
            .debug(options.debug);
        let link = tokio::task::spawn_blocking(move || linker.link(&plan))
            .await
            .map_err(|e| PackageManagerError::IoError(format!("linking task failed: {e}")))??;
        pakt_logger::phase("Linking", phase, options.debug);

        let lockfile_written = if options.use_lockfile && !options.frozen_lockfile {
            let settings = LockSettings {
                node_linker: config.strategy,
                engine_strict: config.engine_strict,
            };
            graph_to_lockfile(&graph, &importers, settings)?.write_to(&lock_path)?
        } else {
            false
        };

        for index in &change.edited {
            if let Some(importer) = importers.get(*index) {
                write_package_json(&importer.root_dir, &importer.manifest)?;
            }
        }

        for warning in &warnings {
            pakt_logger::warn(warning);
        }
        pakt_logger::phase("Install", started, options.debug);

        Ok(InstallReport {
            installed: layout_graph.packages.len(),
            extracted: store.extractions(),
            graph,
            link,
            lockfile_written,
            warnings,
        })
    }
}

/// Runs an install future on a fresh runtime, for synchronous callers.
pub fn block_on<T>(future: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PackageManagerError::IoError(format!("Failed to create async runtime: {e}")))?
        .block_on(future)
}

fn importer_manifest(importers: &mut [ImporterManifest], index: usize) -> Result<&mut PackageJson> {
    importers
        .get_mut(index)
        .map(|importer| &mut importer.manifest)
        .ok_or_else(|| PackageManagerError::PackageJsonError("no project to edit".to_string()))
}

fn owned_entries(manifest: &PackageJson) -> Vec<(DependencyType, String, String)> {
    manifest
        .installable_dependencies(false)
        .into_iter()
        .map(|(field, alias, raw)| (field, alias.to_string(), raw.to_string()))
        .collect()
}

/// Manifest specifier to resolve with, the specifier to save verbatim (if
/// any) and the real name behind an alias.
fn add_specifier(version: Option<String>) -> Result<(String, Option<String>, Option<String>)> {
    let Some(version) = version else {
        return Ok((DEFAULT_TAG.to_string(), None, None));
    };

    if let Some(target) = version.strip_prefix("npm:") {
        let (real, _) = parse_npm_alias(&version)
            .ok_or_else(|| PackageManagerError::InvalidPackageSpec(version.clone()))?;
        let has_range = split_name_version(target)
            .1
            .is_some_and(|range| !range.is_empty());
        if has_range {
            return Ok((version.clone(), Some(version), None));
        }
        return Ok((format!("npm:{real}@{DEFAULT_TAG}"), None, Some(real)));
    }

    if version.starts_with("workspace:") || version.parse::<VersionRange>().is_ok() {
        return Ok((version.clone(), Some(version), None));
    }
    // A dist-tag: resolve it, then save the version it pointed at.
    Ok((version, None, None))
}

/// Writes the saved specifier into the manifest and the graph's importer edge.
fn apply_save(
    save: &PendingSave,
    importers: &mut [ImporterManifest],
    graph: &mut DependencyGraph,
    config: &EffectiveConfig,
) -> Result<()> {
    let Some(edge) = graph
        .importers
        .get_mut(save.importer)
        .and_then(|importer| importer.edges.iter_mut().find(|edge| edge.spec.alias == save.alias))
    else {
        return Ok(());
    };
    let Target::Package(id) = &edge.target else {
        return Ok(());
    };

    let saved = DependencyManager::save_specifier(
        save.requested.as_deref(),
        save.alias_target.as_deref(),
        &id.version.to_string(),
        config.save_exact,
        &config.save_prefix,
    );
    edge.spec = DependencySpec::parse(&save.alias, &saved, save.field)?;
    let manifest = importer_manifest(importers, save.importer)?;
    DependencyManager::add_dependency(manifest, &save.alias, &saved, save.field);
    Ok(())
}

/// The graph a production install lays out: no importer dev edges and
/// nothing only they reached.
fn without_dev_dependencies(graph: &DependencyGraph) -> DependencyGraph {
    let mut pruned = graph.clone();
    for importer in &mut pruned.importers {
        importer
            .edges
            .retain(|edge| edge.spec.field != DependencyType::DevDependencies);
    }
    pruned.retain_reachable();
    pruned
}
