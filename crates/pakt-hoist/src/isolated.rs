use pakt_constants::{MODULES_DIR, VIRTUAL_STORE_DIR};
use pakt_resolver::{DependencyGraph, PackageId, Target};
use pakt_utils::get_module_path;
use std::path::{Path, PathBuf};

use crate::plan::{LayoutEntry, LayoutPlan};

/// Directory name of an identity inside the virtual store.
#[must_use]
pub fn virtual_store_name(id: &PackageId) -> String {
    format!("{}@{}", id.name.replace('/', "+"), id.version)
}

/// `<root>/node_modules/.pakt/<name>@<version>`; the package itself lives in
/// its `node_modules/<name>` and its dependencies are links beside it.
#[must_use]
pub fn virtual_store_dir(root: &Path, id: &PackageId) -> PathBuf {
    root.join(MODULES_DIR)
        .join(VIRTUAL_STORE_DIR)
        .join(virtual_store_name(id))
}

#[must_use]
pub fn virtual_store_path(root: &Path, id: &PackageId) -> PathBuf {
    get_module_path(&virtual_store_dir(root, id), &id.name)
}

/// Exact-dependency layout: every package sees only what it declared.
#[must_use]
pub fn plan_isolated(graph: &DependencyGraph, root: &Path) -> LayoutPlan {
    let mut plan = LayoutPlan::new(root);
    let link_to = |target: &Target| match target {
        Target::Package(id) => Some(virtual_store_path(root, id)),
        Target::Workspace(importer) => graph.importer(importer).map(|i| i.root_dir.clone()),
    };

    for importer in &graph.importers {
        plan.insert_project(&importer.root_dir, &importer.id);
        for edge in &importer.edges {
            if let Some(target) = link_to(&edge.target) {
                plan.bind(&importer.root_dir, &edge.spec.alias, LayoutEntry::Link { target });
            }
        }
    }

    for (id, package) in &graph.packages {
        let content = virtual_store_path(root, id);
        plan.insert_at(content, LayoutEntry::Package {
            id: id.clone(),
            alias: id.name.clone(),
        });

        let dir = virtual_store_dir(root, id);
        for edge in &package.edges {
            // The package's own directory occupies its name.
            if edge.spec.alias == id.name {
                continue;
            }
            if let Some(target) = link_to(&edge.target) {
                plan.bind(&dir, &edge.spec.alias, LayoutEntry::Link { target });
            }
        }
    }

    plan
}
