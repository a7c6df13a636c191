use pakt_resolver::{DependencyGraph, Owner, Target};
use pakt_utils::is_node_modules_dir;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};

use crate::plan::{LayoutEntry, LayoutPlan};

/// Bindings claimed so far, per directory whose `node_modules` holds them.
type Ownership = HashMap<PathBuf, HashMap<String, Target>>;

/// A set of importers hoisted into one shared `node_modules`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoistGroup {
    pub root: PathBuf,
    /// Importer indices, group root first.
    pub importers: Vec<usize>,
}

/// Groups importers by the directory whose `node_modules` they share.
///
/// Every importer below `root` shares `root` itself, whether or not `root`
/// is a project. An importer outside `root` falls back to the outermost
/// importer directory containing it.
#[must_use]
pub fn hoist_groups(graph: &DependencyGraph, root: &Path) -> Vec<HoistGroup> {
    let mut groups: BTreeMap<PathBuf, Vec<usize>> = BTreeMap::new();
    for (index, importer) in graph.importers.iter().enumerate() {
        let shared = if importer.root_dir.starts_with(root) {
            root
        } else {
            graph
                .importers
                .iter()
                .map(|other| other.root_dir.as_path())
                .filter(|dir| importer.root_dir.starts_with(dir))
                .min_by_key(|dir| dir.components().count())
                .unwrap_or(importer.root_dir.as_path())
        };
        groups.entry(shared.to_path_buf()).or_default().push(index);
    }

    groups
        .into_iter()
        .map(|(root, mut importers)| {
            importers.sort_by_key(|&index| {
                graph
                    .importers
                    .get(index)
                    .is_none_or(|importer| importer.root_dir != root)
            });
            HoistGroup { root, importers }
        })
        .collect()
}

/// Flattened layout; disjoint groups are planned in parallel.
#[must_use]
pub fn plan_hoisted(graph: &DependencyGraph, root: &Path) -> LayoutPlan {
    let plans: Vec<LayoutPlan> = hoist_groups(graph, root)
        .par_iter()
        .map(|group| hoist_group(graph, root, group))
        .collect();

    let mut merged = LayoutPlan::new(root);
    for plan in plans {
        merged.merge(plan);
    }
    merged
}

/// Breadth-first placement for one group. The first claim of a slot wins.
fn hoist_group(graph: &DependencyGraph, root: &Path, group: &HoistGroup) -> LayoutPlan {
    let mut plan = LayoutPlan::new(root);
    let mut owned: Ownership = HashMap::new();
    let mut queue: VecDeque<(PathBuf, Owner)> = VecDeque::new();

    for &index in &group.importers {
        if let Some(importer) = graph.importers.get(index) {
            plan.insert_project(&importer.root_dir, &importer.id);
            queue.push_back((importer.root_dir.clone(), Owner::Importer(index)));
        }
    }

    while let Some((dir, owner)) = queue.pop_front() {
        for edge in graph.edges(&owner) {
            let alias = edge.spec.alias.as_str();

            let id = match &edge.target {
                Target::Workspace(importer_id) => {
                    if let Some(target) = graph.importer(importer_id) {
                        claim(&mut owned, &dir, alias, &edge.target);
                        plan.bind(&dir, alias, LayoutEntry::Link {
                            target: target.root_dir.clone(),
                        });
                    }
                    continue;
                }
                Target::Package(id) => id,
            };

            let place_at = match nearest_binding(&owned, &dir, alias) {
                Some(found) if found == &edge.target => continue,
                Some(_) => dir.clone(),
                None => group.root.clone(),
            };

            claim(&mut owned, &place_at, alias, &edge.target);
            let path = plan.bind(&place_at, alias, LayoutEntry::Package {
                id: id.clone(),
                alias: alias.to_string(),
            });
            queue.push_back((path, Owner::Package(id.clone())));
        }
    }

    plan
}

/// The binding `alias` would resolve to from `dir`.
fn nearest_binding<'a>(owned: &'a Ownership, dir: &Path, alias: &str) -> Option<&'a Target> {
    dir.ancestors()
        .filter(|ancestor| !is_node_modules_dir(ancestor))
        .find_map(|ancestor| owned.get(ancestor).and_then(|slots| slots.get(alias)))
}

fn claim(owned: &mut Ownership, dir: &Path, alias: &str, target: &Target) {
    owned
        .entry(dir.to_path_buf())
        .or_default()
        .entry(alias.to_string())
        .or_insert_with(|| target.clone());
}
