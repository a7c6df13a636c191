use indexmap::IndexMap;
use pakt_project::DependencyType;
use pakt_resolver::{
    DependencyGraph, DependencySpec, Edge, GraphPackage, Importer, PackageId, ResolvedPackage,
    Target,
};
use pakt_store::Integrity;
use std::path::PathBuf;
use std::sync::Arc;

/// Hand-built graphs for layout tests.
#[derive(Default)]
pub struct GraphBuilder {
    graph: DependencyGraph,
}

fn edge(alias: &str, target: &str) -> Edge {
    let id: PackageId = target.parse().unwrap();
    let mut spec = DependencySpec::parse(alias, "*", DependencyType::Dependencies).unwrap();
    spec.name = id.name.clone();
    Edge {
        spec,
        target: Target::Package(id),
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn importer(mut self, id: &str, dir: &str, edges: &[(&str, &str)]) -> Self {
        self.graph.importers.push(Importer {
            id: id.to_string(),
            root_dir: PathBuf::from(dir),
            name: Some(id.rsplit('/').next().unwrap().to_string()),
            version: None,
            edges: edges.iter().map(|(alias, target)| edge(alias, target)).collect(),
        });
        self
    }

    pub fn workspace_edge(mut self, importer: &str, alias: &str, target: &str) -> Self {
        let spec = DependencySpec::parse(alias, "workspace:*", DependencyType::Dependencies).unwrap();
        let owner = self
            .graph
            .importers
            .iter_mut()
            .find(|i| i.id == importer)
            .unwrap();
        owner.edges.push(Edge {
            spec,
            target: Target::Workspace(target.to_string()),
        });
        self
    }

    pub fn package(self, id: &str, edges: &[(&str, &str)]) -> Self {
        self.insert(id, edges, IndexMap::new())
    }

    pub fn package_with_bin(self, id: &str, bin: &[(&str, &str)]) -> Self {
        let bin = bin
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        self.insert(id, &[], bin)
    }

    fn insert(mut self, id: &str, edges: &[(&str, &str)], bin: IndexMap<String, String>) -> Self {
        let id: PackageId = id.parse().unwrap();
        let edges: Vec<Edge> = edges.iter().map(|(alias, target)| edge(alias, target)).collect();
        let package = ResolvedPackage {
            integrity: Integrity::sha512(id.to_string().as_bytes()),
            tarball: String::new(),
            dependencies: edges.iter().map(|e| e.spec.clone()).collect(),
            peers: Vec::new(),
            engines: IndexMap::new(),
            os: Vec::new(),
            cpu: Vec::new(),
            bin,
            requires_build: false,
            id: id.clone(),
        };
        self.graph.packages.insert(id, GraphPackage {
            package: Arc::new(package),
            edges,
        });
        self
    }

    pub fn build(self) -> DependencyGraph {
        self.graph
    }
}
