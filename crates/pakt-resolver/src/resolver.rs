use futures::stream::{FuturesUnordered, StreamExt};
use pakt_error::{PackageManagerError, Result};
use pakt_project::{DependencyType, PackageJson};
use pakt_registry::{IndexClient, PackageMetadata, VersionMetadata};
use semver::Version;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::engines::EngineContext;
use crate::graph::{
    DependencyGraph, DependencySpec, Edge, GraphPackage, Importer, Owner, PackageId, PeerSpec,
    ResolvedPackage, Target, VersionConstraint,
};
use crate::peers::check_peers;
use crate::semver_range::VersionRange;
use crate::single_flight::SingleFlight;
use crate::spec::merge_specs;

/// Which packages ignore the prior graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UpdateSet {
    #[default]
    None,
    All,
    Names(BTreeSet<String>),
}

impl UpdateSet {
    #[must_use]
    pub fn bypasses(&self, name: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Names(names) => names.contains(name),
        }
    }
}

/// A located project and its manifest.
#[derive(Debug, Clone)]
pub struct ImporterManifest {
    pub id: String,
    pub root_dir: PathBuf,
    pub manifest: PackageJson,
}

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub engine_strict: bool,
    pub engines: EngineContext,
    pub update: UpdateSet,
    pub production: bool,
    /// In-flight index requests.
    pub concurrency: usize,
    pub debug: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            engine_strict: false,
            engines: EngineContext::default(),
            update: UpdateSet::None,
            production: false,
            concurrency: 16,
            debug: false,
        }
    }
}

#[derive(Debug)]
pub struct Resolution {
    pub graph: DependencyGraph,
    pub warnings: Vec<String>,
}

enum Resolved {
    Package(Arc<ResolvedPackage>),
    Workspace(String),
}

struct Job {
    owner: Owner,
    slot: usize,
    spec: DependencySpec,
}

struct WorkspaceIndex {
    by_name: HashMap<String, (String, Option<Version>)>,
}

impl WorkspaceIndex {
    fn new(importers: &[ImporterManifest]) -> Self {
        let by_name = importers
            .iter()
            .filter_map(|importer| {
                let name = importer.manifest.name.clone()?;
                let version = importer
                    .manifest
                    .version
                    .as_deref()
                    .and_then(|v| Version::parse(v).ok());
                Some((name, (importer.id.clone(), version)))
            })
            .collect();
        Self { by_name }
    }

    fn resolve(&self, spec: &DependencySpec, range: &str) -> Result<Resolved> {
        let not_found = || PackageManagerError::NotFound(spec.name.clone(), spec.raw.clone());
        let (id, version) = self.by_name.get(&spec.name).ok_or_else(not_found)?;

        let accepted = match range {
            "" | "*" | "^" | "~" => true,
            other => match (other.parse::<VersionRange>(), version) {
                (Ok(parsed), Some(version)) => parsed.matches(version),
                _ => false,
            },
        };
        if accepted {
            Ok(Resolved::Workspace(id.clone()))
        } else {
            Err(not_found())
        }
    }
}

#[derive(Default)]
struct BuildState {
    importers: Vec<Importer>,
    importer_slots: Vec<Vec<Option<Edge>>>,
    packages: BTreeMap<PackageId, (Arc<ResolvedPackage>, Vec<Option<Edge>>)>,
    warned: HashSet<PackageId>,
    warnings: Vec<String>,
}

impl BuildState {
    fn set_slot(&mut self, owner: &Owner, slot: usize, edge: Edge) {
        let slots = match owner {
            Owner::Importer(index) => self.importer_slots.get_mut(*index),
            Owner::Package(id) => self.packages.get_mut(id).map(|(_, slots)| slots),
        };
        if let Some(entry) = slots.and_then(|slots| slots.get_mut(slot)) {
            *entry = Some(edge);
        }
    }

    fn finish(self) -> (DependencyGraph, Vec<String>) {
        let importers = self
            .importers
            .into_iter()
            .zip(self.importer_slots)
            .map(|(mut importer, slots)| {
                importer.edges = slots.into_iter().flatten().collect();
                importer
            })
            .collect();
        let packages = self
            .packages
            .into_iter()
            .map(|(id, (package, slots))| {
                let edges = slots.into_iter().flatten().collect();
                (id, GraphPackage { package, edges })
            })
            .collect();

        (
            DependencyGraph {
                importers,
                packages,
            },
            self.warnings,
        )
    }
}

/// Builds the dependency graph breadth-first from the importers.
pub struct DependencyResolver<'a, C: IndexClient> {
    index: &'a C,
    prior: Option<&'a DependencyGraph>,
    options: ResolveOptions,
    cancel: CancellationToken,
    metadata: SingleFlight<String, Arc<PackageMetadata>>,
    derived: SingleFlight<PackageId, Arc<ResolvedPackage>>,
    limiter: Semaphore,
}

impl<'a, C: IndexClient> DependencyResolver<'a, C> {
    pub fn new(index: &'a C, prior: Option<&'a DependencyGraph>, options: ResolveOptions) -> Self {
        let permits = options.concurrency.max(1);
        Self {
            index,
            prior,
            options,
            cancel: CancellationToken::new(),
            metadata: SingleFlight::new(),
            derived: SingleFlight::new(),
            limiter: Semaphore::new(permits),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn resolve(&self, manifests: &[ImporterManifest]) -> Result<Resolution> {
        let workspace = WorkspaceIndex::new(manifests);
        let mut state = BuildState::default();
        let mut ready: VecDeque<(Job, Resolved)> = VecDeque::new();
        let mut pending = FuturesUnordered::new();

        for (index, importer) in manifests.iter().enumerate() {
            let manifest = &importer.manifest;
            let issues = self
                .options
                .engines
                .check_engines(manifest.engines.iter().flatten());
            let label = manifest.name.clone().unwrap_or_else(|| importer.id.clone());
            if !issues.is_empty() {
                if self.options.engine_strict {
                    return Err(PackageManagerError::EngineIncompatible(label, issues.join("; ")));
                }
                state
                    .warnings
                    .push(format!("Unsupported engine for {label}: {}", issues.join("; ")));
            }

            let specs = merge_specs(
                &importer.id,
                manifest.installable_dependencies(self.options.production),
            )?;
            let prior_importer = self.prior.and_then(|g| g.importer(&importer.id));

            state.importers.push(Importer {
                id: importer.id.clone(),
                root_dir: importer.root_dir.clone(),
                name: manifest.name.clone(),
                version: manifest.version.as_deref().and_then(|v| Version::parse(v).ok()),
                edges: Vec::new(),
            });
            state.importer_slots.push(vec![None; specs.len()]);

            for (slot, spec) in specs.into_iter().enumerate() {
                let job = Job {
                    owner: Owner::Importer(index),
                    slot,
                    spec,
                };
                match self.reusable_importer_edge(prior_importer, &job.spec) {
                    Some(resolved) => ready.push_back((job, resolved)),
                    None => pending.push(self.run_job(job, &workspace)),
                }
            }
        }

        loop {
            while let Some((job, resolved)) = ready.pop_front() {
                for job in self.accept(job, resolved, &mut state, &mut ready)? {
                    pending.push(self.run_job(job, &workspace));
                }
            }

            if self.cancel.is_cancelled() {
                return Err(PackageManagerError::Cancelled);
            }
            pakt_logger::progress("Resolving dependencies", state.packages.len(), 0);

            let Some((job, result)) = pending.next().await else {
                break;
            };
            match result {
                Ok(resolved) => ready.push_back((job, resolved)),
                Err(e) if job.spec.is_optional() && !matches!(e, PackageManagerError::Cancelled) => {
                    state.warnings.push(format!(
                        "Skipping optional dependency {}: {e}",
                        job.spec.alias
                    ));
                }
                Err(e) => return Err(e),
            }
        }

        let (graph, mut warnings) = state.finish();
        warnings.extend(check_peers(&graph));
        pakt_logger::debug(
            &format!(
                "Resolved {} packages for {} importers ({} metadata documents)",
                graph.packages.len(),
                graph.importers.len(),
                self.metadata.completed()
            ),
            self.options.debug,
        );

        Ok(Resolution { graph, warnings })
    }

    /// A locked importer edge stays when the specifier is unchanged or the
    /// locked version still satisfies the range.
    fn reusable_importer_edge(
        &self,
        prior_importer: Option<&Importer>,
        spec: &DependencySpec,
    ) -> Option<Resolved> {
        if self.options.update.bypasses(&spec.name) {
            return None;
        }
        let edge = prior_importer?
            .edges
            .iter()
            .find(|e| e.spec.alias == spec.alias)?;
        if edge.spec.name != spec.name {
            return None;
        }

        let Target::Package(id) = &edge.target else {
            return None;
        };
        let unchanged = edge.spec.raw == spec.raw;
        let satisfied =
            matches!(&spec.constraint, VersionConstraint::Range(range) if range.matches(&id.version));
        if !(unchanged || satisfied) {
            return None;
        }

        let locked = self.prior?.package(id)?;
        Some(Resolved::Package(Arc::clone(&locked.package)))
    }

    async fn run_job(&self, job: Job, workspace: &WorkspaceIndex) -> (Job, Result<Resolved>) {
        let result = self.resolve_spec(&job.spec, workspace).await;
        (job, result)
    }

    async fn resolve_spec(&self, spec: &DependencySpec, workspace: &WorkspaceIndex) -> Result<Resolved> {
        let fresh = self.options.update.bypasses(&spec.name);

        let version = match &spec.constraint {
            VersionConstraint::Workspace(range) => return workspace.resolve(spec, range),
            VersionConstraint::Range(range) => {
                let preferred = self
                    .prior
                    .filter(|_| !fresh)
                    .and_then(|g| g.versions_of(&spec.name).filter(|v| range.matches(v)).max())
                    .cloned();
                match preferred {
                    Some(version) => version,
                    None => {
                        let metadata = self.metadata(&spec.name).await?;
                        range
                            .max_satisfying(metadata.versions.keys().map(String::as_str))
                            .ok_or_else(|| {
                                PackageManagerError::NotFound(spec.name.clone(), spec.raw.clone())
                            })?
                    }
                }
            }
            VersionConstraint::Tag(tag) => {
                let metadata = self.metadata(&spec.name).await?;
                metadata
                    .dist_tags
                    .get(tag)
                    .and_then(|v| Version::parse(v).ok())
                    .ok_or_else(|| PackageManagerError::NotFound(spec.name.clone(), tag.clone()))?
            }
        };

        let id = PackageId::new(&spec.name, version);
        self.derive(&id, fresh).await.map(Resolved::Package)
    }

    async fn metadata(&self, name: &str) -> Result<Arc<PackageMetadata>> {
        self.metadata
            .get_or_try_init(&name.to_string(), || async {
                let _permit = self
                    .limiter
                    .acquire()
                    .await
                    .map_err(|_| PackageManagerError::Cancelled)?;
                pakt_logger::debug(&format!("Fetching metadata for {name}"), self.options.debug);
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => Err(PackageManagerError::Cancelled),
                    result = self.index.package_metadata(name) => result.map(Arc::new),
                }
            })
            .await
    }

    async fn derive(&self, id: &PackageId, fresh: bool) -> Result<Arc<ResolvedPackage>> {
        self.derived
            .get_or_try_init(id, || async {
                if !fresh {
                    if let Some(locked) = self.prior.and_then(|g| g.package(id)) {
                        return Ok(Arc::clone(&locked.package));
                    }
                }
                let metadata = self.metadata(&id.name).await?;
                let version_meta = metadata
                    .versions
                    .iter()
                    .find(|(v, _)| Version::parse(v).is_ok_and(|v| v == id.version))
                    .map(|(_, meta)| meta)
                    .ok_or_else(|| {
                        PackageManagerError::NotFound(id.name.clone(), id.version.to_string())
                    })?;
                resolved_from_metadata(id, version_meta).map(Arc::new)
            })
            .await
    }

    /// Records a resolved edge; returns jobs for dependencies of newly seen packages.
    fn accept(
        &self,
        job: Job,
        resolved: Resolved,
        state: &mut BuildState,
        ready: &mut VecDeque<(Job, Resolved)>,
    ) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        let target = match resolved {
            Resolved::Workspace(id) => Target::Workspace(id),
            Resolved::Package(package) => {
                let issues = self.options.engines.check_package(&package);
                if !issues.is_empty() {
                    if job.spec.is_optional() {
                        state.warnings.push(format!(
                            "Skipping optional dependency {} ({}): {}",
                            job.spec.alias,
                            package.id,
                            issues.join("; ")
                        ));
                        return Ok(jobs);
                    }
                    if self.options.engine_strict {
                        return Err(PackageManagerError::EngineIncompatible(
                            package.id.to_string(),
                            issues.join("; "),
                        ));
                    }
                    if state.warned.insert(package.id.clone()) {
                        state.warnings.push(format!(
                            "Unsupported engine for {}: {}",
                            package.id,
                            issues.join("; ")
                        ));
                    }
                }

                let id = package.id.clone();
                jobs = self.discover(package, state, ready);
                Target::Package(id)
            }
        };

        state.set_slot(&job.owner, job.slot, Edge {
            spec: job.spec,
            target,
        });
        Ok(jobs)
    }

    /// Adds a package the first time it is seen. A package locked with the
    /// same content keeps its locked edges, so its subtree is not re-resolved.
    fn discover(
        &self,
        package: Arc<ResolvedPackage>,
        state: &mut BuildState,
        ready: &mut VecDeque<(Job, Resolved)>,
    ) -> Vec<Job> {
        if state.packages.contains_key(&package.id) {
            return Vec::new();
        }
        pakt_logger::debug(&format!("Resolved {}", package.id), self.options.debug);

        let owner = Owner::Package(package.id.clone());
        let locked = self
            .prior
            .filter(|_| !self.options.update.bypasses(&package.id.name))
            .and_then(|g| g.package(&package.id))
            .filter(|locked| *locked.package == *package);

        let mut jobs = Vec::new();
        match locked {
            Some(locked) => {
                state
                    .packages
                    .insert(package.id.clone(), (package, vec![None; locked.edges.len()]));
                for (slot, edge) in locked.edges.iter().enumerate() {
                    let job = Job {
                        owner: owner.clone(),
                        slot,
                        spec: edge.spec.clone(),
                    };
                    let reused = match &edge.target {
                        Target::Package(target) if !self.options.update.bypasses(&target.name) => {
                            self.prior.and_then(|g| g.package(target))
                        }
                        _ => None,
                    };
                    match reused {
                        Some(target) => {
                            ready.push_back((job, Resolved::Package(Arc::clone(&target.package))));
                        }
                        None => jobs.push(job),
                    }
                }
            }
            None => {
                let slots = vec![None; package.dependencies.len()];
                jobs.extend(package.dependencies.iter().enumerate().map(|(slot, spec)| Job {
                    owner: owner.clone(),
                    slot,
                    spec: spec.clone(),
                }));
                state.packages.insert(package.id.clone(), (package, slots));
            }
        }
        jobs
    }
}

/// Derives a package from its version document.
pub fn resolved_from_metadata(id: &PackageId, meta: &VersionMetadata) -> Result<ResolvedPackage> {
    let integrity = meta.integrity().ok_or_else(|| {
        PackageManagerError::IntegrityMismatch(
            id.to_string(),
            "(none)".to_string(),
            "index declared no integrity".to_string(),
        )
    })?;

    let dependencies = merge_specs(
        &id.to_string(),
        meta.dependencies
            .iter()
            .map(|(k, v)| (DependencyType::Dependencies, k.as_str(), v.as_str()))
            .chain(
                meta.optional_dependencies
                    .iter()
                    .map(|(k, v)| (DependencyType::OptionalDependencies, k.as_str(), v.as_str())),
            ),
    )?;

    let peers = meta
        .peer_dependencies
        .iter()
        .map(|(name, range)| PeerSpec {
            name: name.clone(),
            range: range.clone(),
            optional: meta
                .peer_dependencies_meta
                .get(name)
                .is_some_and(|m| m.optional),
        })
        .collect();

    Ok(ResolvedPackage {
        id: id.clone(),
        integrity,
        tarball: meta.dist.tarball.clone(),
        dependencies,
        peers,
        engines: meta.engines.clone(),
        os: meta.os.clone(),
        cpu: meta.cpu.clone(),
        bin: meta.bin_map(),
        requires_build: meta.requires_build(),
    })
}
