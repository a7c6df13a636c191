//! Conversion between the dependency graph and the on-disk lockfile.

use indexmap::IndexMap;
use pakt_error::{PackageManagerError, Result};
use pakt_hoist::LinkingStrategy;
use pakt_lock::{LINK_PREFIX, LockDependency, LockImporter, LockPackage, LockSettings, Lockfile};
use pakt_project::DependencyType;
use pakt_resolver::{
    DependencyGraph, DependencySpec, Edge, GraphPackage, Importer, ImporterManifest, PackageId,
    PeerSpec, ResolvedPackage, Target, merge_specs,
};
use semver::Version;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// How a resolved target is written next to its specifier.
#[must_use]
pub fn version_ref(spec: &DependencySpec, target: &Target) -> String {
    match target {
        Target::Workspace(importer) => format!("{LINK_PREFIX}{importer}"),
        Target::Package(id) if id.name == spec.alias => id.version.to_string(),
        Target::Package(id) => id.to_string(),
    }
}

/// Inverse of [`version_ref`].
pub fn parse_version_ref(spec: &DependencySpec, reference: &str) -> Result<Target> {
    if let Some(importer) = reference.strip_prefix(LINK_PREFIX) {
        return Ok(Target::Workspace(importer.to_string()));
    }
    if let Ok(version) = Version::parse(reference) {
        return Ok(Target::Package(PackageId::new(&spec.name, version)));
    }
    reference.parse::<PackageId>().map(Target::Package).map_err(|_| {
        PackageManagerError::LockfileError(format!(
            "'{}' has an invalid version reference '{reference}'",
            spec.alias
        ))
    })
}

fn importer_specs(manifest: &ImporterManifest) -> Result<Vec<DependencySpec>> {
    merge_specs(&manifest.id, manifest.manifest.installable_dependencies(false))
}

fn field_mut(importer: &mut LockImporter, field: DependencyType) -> &mut BTreeMap<String, LockDependency> {
    match field {
        DependencyType::DevDependencies => &mut importer.dev_dependencies,
        DependencyType::OptionalDependencies => &mut importer.optional_dependencies,
        DependencyType::Dependencies | DependencyType::PeerDependencies => &mut importer.dependencies,
    }
}

fn locked_entries(importer: &LockImporter) -> impl Iterator<Item = (DependencyType, &String, &LockDependency)> {
    let fields = [
        (DependencyType::Dependencies, &importer.dependencies),
        (DependencyType::OptionalDependencies, &importer.optional_dependencies),
        (DependencyType::DevDependencies, &importer.dev_dependencies),
    ];
    fields
        .into_iter()
        .flat_map(|(field, deps)| deps.iter().map(move |(alias, dep)| (field, alias, dep)))
}

/// Serializable form of `graph`. Importer entries list every declared
/// specifier, including optional ones that were skipped.
pub fn graph_to_lockfile(
    graph: &DependencyGraph,
    manifests: &[ImporterManifest],
    settings: LockSettings,
) -> Result<Lockfile> {
    let mut lockfile = Lockfile::new(settings);
    if let Some(root) = crate::workspace::root_manifest(manifests) {
        lockfile.engines = root.engines.clone().unwrap_or_default();
    }

    for manifest in manifests {
        let edges = graph
            .importer(&manifest.id)
            .map_or(&[][..], |importer| importer.edges.as_slice());
        let mut locked = LockImporter::default();
        for spec in importer_specs(manifest)? {
            let version = edges
                .iter()
                .find(|edge| edge.spec.alias == spec.alias)
                .map(|edge| version_ref(&spec, &edge.target));
            field_mut(&mut locked, spec.field)
                .insert(spec.alias.clone(), LockDependency::new(&spec.raw, version));
        }
        lockfile.importers.insert(manifest.id.clone(), locked);
    }

    for (id, node) in &graph.packages {
        lockfile.packages.insert(
            Lockfile::package_key(&id.name, &id.version.to_string()),
            lock_package(node),
        );
    }
    Ok(lockfile)
}

fn lock_package(node: &GraphPackage) -> LockPackage {
    let package = &node.package;
    let mut dependencies = IndexMap::new();
    for spec in &package.dependencies {
        let version = node
            .edges
            .iter()
            .find(|edge| edge.spec.alias == spec.alias)
            .map(|edge| version_ref(spec, &edge.target));
        dependencies.insert(
            spec.alias.clone(),
            LockDependency::new(&spec.raw, version).optional(spec.is_optional()),
        );
    }

    LockPackage {
        integrity: package.integrity.to_string(),
        tarball: package.tarball.clone(),
        dependencies,
        peer_dependencies: package
            .peers
            .iter()
            .map(|peer| (peer.name.clone(), peer.range.clone()))
            .collect(),
        optional_peers: package
            .peers
            .iter()
            .filter(|peer| peer.optional)
            .map(|peer| peer.name.clone())
            .collect(),
        engines: package.engines.clone(),
        os: package.os.clone(),
        cpu: package.cpu.clone(),
        bin: package.bin.clone(),
        requires_build: package.requires_build,
    }
}

/// Decodes the lockfile into a graph the resolver can reuse.
///
/// Importer edges are kept only for aliases the manifests still declare, in
/// manifest order; their specs carry the locked specifier.
pub fn lockfile_to_graph(lockfile: &Lockfile, manifests: &[ImporterManifest]) -> Result<DependencyGraph> {
    let mut graph = DependencyGraph::default();

    for (key, locked) in &lockfile.packages {
        let id: PackageId = key
            .parse()
            .map_err(|_| PackageManagerError::LockfileError(format!("invalid package key '{key}'")))?;
        let node = graph_package(&id, locked)?;
        graph.packages.insert(id, node);
    }

    for manifest in manifests {
        let locked = lockfile.importers.get(&manifest.id);
        let mut edges = Vec::new();
        for spec in importer_specs(manifest)? {
            let Some((field, dep)) = locked.and_then(|importer| {
                locked_entries(importer)
                    .find(|(_, alias, _)| **alias == spec.alias)
                    .map(|(field, _, dep)| (field, dep))
            }) else {
                continue;
            };
            let Some(reference) = &dep.version else {
                continue;
            };
            let locked_spec = DependencySpec::parse(&spec.alias, &dep.specifier, field)?;
            let target = parse_version_ref(&locked_spec, reference)?;
            edges.push(Edge {
                spec: locked_spec,
                target,
            });
        }

        graph.importers.push(Importer {
            id: manifest.id.clone(),
            root_dir: manifest.root_dir.clone(),
            name: manifest.manifest.name.clone(),
            version: manifest
                .manifest
                .version
                .as_deref()
                .and_then(|v| Version::parse(v).ok()),
            edges,
        });
    }

    let missing: Vec<String> = graph
        .importers
        .iter()
        .flat_map(|importer| importer.edges.iter())
        .chain(graph.packages.values().flat_map(|node| node.edges.iter()))
        .filter_map(|edge| match &edge.target {
            Target::Package(id) if !graph.packages.contains_key(id) => Some(id.to_string()),
            _ => None,
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if !missing.is_empty() {
        return Err(PackageManagerError::LockfileError(format!(
            "lockfile references packages it does not contain: {}",
            missing.join(", ")
        )));
    }

    Ok(graph)
}

fn graph_package(id: &PackageId, locked: &LockPackage) -> Result<GraphPackage> {
    let integrity = locked
        .integrity
        .parse()
        .map_err(|e: String| PackageManagerError::LockfileError(format!("{id}: {e}")))?;

    let mut dependencies = Vec::new();
    let mut edges = Vec::new();
    for (alias, dep) in &locked.dependencies {
        let field = if dep.optional {
            DependencyType::OptionalDependencies
        } else {
            DependencyType::Dependencies
        };
        let spec = DependencySpec::parse(alias, &dep.specifier, field)?;
        if let Some(reference) = &dep.version {
            edges.push(Edge {
                target: parse_version_ref(&spec, reference)?,
                spec: spec.clone(),
            });
        }
        dependencies.push(spec);
    }

    let peers = locked
        .peer_dependencies
        .iter()
        .map(|(name, range)| PeerSpec {
            name: name.clone(),
            range: range.clone(),
            optional: locked.optional_peers.contains(name),
        })
        .collect();

    Ok(GraphPackage {
        package: Arc::new(ResolvedPackage {
            id: id.clone(),
            integrity,
            tarball: locked.tarball.clone(),
            dependencies,
            peers,
            engines: locked.engines.clone(),
            os: locked.os.clone(),
            cpu: locked.cpu.clone(),
            bin: locked.bin.clone(),
            requires_build: locked.requires_build,
        }),
        edges,
    })
}

/// Every reason the lockfile cannot be installed as-is for these manifests.
pub fn divergences(
    lockfile: Option<&Lockfile>,
    manifests: &[ImporterManifest],
    strategy: LinkingStrategy,
) -> Result<Vec<String>> {
    let Some(lockfile) = lockfile else {
        return Ok(vec!["lockfile is missing".to_string()]);
    };

    let mut reasons = Vec::new();
    if lockfile.settings.node_linker != strategy {
        reasons.push(format!(
            "lockfile was written for the {} layout, {strategy} was requested",
            lockfile.settings.node_linker
        ));
    }

    let wanted: BTreeSet<&str> = manifests.iter().map(|m| m.id.as_str()).collect();
    for id in lockfile.importers.keys() {
        if !wanted.contains(id.as_str()) {
            reasons.push(format!("lockfile has importer '{id}' that is not installed"));
        }
    }

    for manifest in manifests {
        let Some(locked) = lockfile.importers.get(&manifest.id) else {
            reasons.push(format!("importer '{}' is not in the lockfile", manifest.id));
            continue;
        };
        let id = &manifest.id;
        let specs = importer_specs(manifest)?;

        for spec in &specs {
            match locked_entries(locked).find(|(_, alias, _)| **alias == spec.alias) {
                None => reasons.push(format!("importer '{id}' adds '{}'", spec.alias)),
                Some((_, _, dep)) if dep.specifier != spec.raw => reasons.push(format!(
                    "importer '{id}' changes '{}' from '{}' to '{}'",
                    spec.alias, dep.specifier, spec.raw
                )),
                Some((field, _, _)) if field != spec.field => reasons.push(format!(
                    "importer '{id}' moves '{}' to {}",
                    spec.alias,
                    spec.field.as_str()
                )),
                Some(_) => {}
            }
        }
        for (_, alias, _) in locked_entries(locked) {
            if !specs.iter().any(|spec| &spec.alias == alias) {
                reasons.push(format!("importer '{id}' removes '{alias}'"));
            }
        }
    }

    Ok(reasons)
}
