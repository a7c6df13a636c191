use crate::graph::{DependencyGraph, Owner, Target};
use crate::semver_range::VersionRange;

/// Reports peers that the owner of a package does not provide, or provides
/// at a version outside the requested range. Never fails.
#[must_use]
pub fn check_peers(graph: &DependencyGraph) -> Vec<String> {
    let owners = (0..graph.importers.len())
        .map(Owner::Importer)
        .chain(graph.packages.keys().cloned().map(Owner::Package));

    let mut warnings = Vec::new();
    for owner in owners {
        let edges = graph.edges(&owner);
        let label = match &owner {
            Owner::Importer(index) => graph
                .importers
                .get(*index)
                .map_or_else(String::new, |i| i.id.clone()),
            Owner::Package(id) => id.to_string(),
        };

        for edge in edges {
            let Target::Package(id) = &edge.target else {
                continue;
            };
            let Some(dependent) = graph.package(id) else {
                continue;
            };

            for peer in &dependent.package.peers {
                let provided = edges.iter().find(|e| e.spec.alias == peer.name);
                match provided.map(|e| &e.target) {
                    None if !peer.optional => warnings.push(format!(
                        "{label}: {id} requires a peer of {}@{} but none is installed",
                        peer.name, peer.range
                    )),
                    Some(Target::Package(provided)) => {
                        let mismatched = peer
                            .range
                            .parse::<VersionRange>()
                            .is_ok_and(|range| !range.matches(&provided.version));
                        if mismatched {
                            warnings.push(format!(
                                "{label}: {id} requires a peer of {}@{} but {} is installed",
                                peer.name, peer.range, provided
                            ));
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DependencySpec, Edge, GraphPackage, Importer, PackageId, PeerSpec, ResolvedPackage};
    use pakt_project::DependencyType;
    use pakt_store::Integrity;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn package(id: &str, peers: Vec<PeerSpec>) -> GraphPackage {
        let id: PackageId = id.parse().unwrap();
        GraphPackage {
            package: Arc::new(ResolvedPackage {
                integrity: Integrity::sha512(id.to_string().as_bytes()),
                id,
                tarball: String::new(),
                dependencies: Vec::new(),
                peers,
                engines: Default::default(),
                os: Vec::new(),
                cpu: Vec::new(),
                bin: Default::default(),
                requires_build: false,
            }),
            edges: Vec::new(),
        }
    }

    fn edge(alias: &str, id: &str) -> Edge {
        let spec = DependencySpec::parse(alias, "*", DependencyType::Dependencies).unwrap();
        Edge {
            spec,
            target: Target::Package(id.parse().unwrap()),
        }
    }

    fn graph(root_edges: Vec<Edge>, packages: Vec<GraphPackage>) -> DependencyGraph {
        DependencyGraph {
            importers: vec![Importer {
                id: ".".into(),
                root_dir: PathBuf::from("/project"),
                name: None,
                version: None,
                edges: root_edges,
            }],
            packages: packages
                .into_iter()
                .map(|p| (p.package.id.clone(), p))
                .collect(),
        }
    }

    fn peer(name: &str, range: &str, optional: bool) -> PeerSpec {
        PeerSpec {
            name: name.into(),
            range: range.into(),
            optional,
        }
    }

    #[test]
    fn missing_and_mismatched_peers_warn() {
        let g = graph(
            vec![edge("plugin", "plugin@1.0.0"), edge("host", "host@1.0.0")],
            vec![
                package("plugin@1.0.0", vec![peer("host", "^2.0.0", false), peer("other", "*", false)]),
                package("host@1.0.0", Vec::new()),
            ],
        );
        let warnings = check_peers(&g);
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|w| w.contains("host@1.0.0 is installed")));
        assert!(warnings.iter().any(|w| w.contains("other@*") && w.contains("none is installed")));
    }

    #[test]
    fn satisfied_and_optional_peers_are_silent() {
        let g = graph(
            vec![edge("plugin", "plugin@1.0.0"), edge("host", "host@2.1.0")],
            vec![
                package("plugin@1.0.0", vec![peer("host", "^2.0.0", false), peer("extra", "*", true)]),
                package("host@2.1.0", Vec::new()),
            ],
        );
        assert!(check_peers(&g).is_empty());
    }
}
