use pakt_resolver::{DependencyGraph, Target};
use pakt_utils::{get_bin_dir, normalize_path};

use crate::plan::{LayoutEntry, LayoutPlan};

/// Plans `node_modules/.bin/<command>` links for each importer's direct
/// dependencies. On a name clash the first declaring dependency wins.
pub fn plan_bins(plan: &mut LayoutPlan, graph: &DependencyGraph) {
    let mut links = Vec::new();

    for importer in &graph.importers {
        let bin_dir = get_bin_dir(&importer.root_dir);
        for edge in &importer.edges {
            let Target::Package(id) = &edge.target else {
                continue;
            };
            let Some(package) = graph.package(id) else {
                continue;
            };
            if package.package.bin.is_empty() {
                continue;
            }
            let Some((location, _)) = plan.resolve(&importer.root_dir, &edge.spec.alias) else {
                continue;
            };

            for (command, file) in &package.package.bin {
                let Some(command) = command_name(command) else {
                    continue;
                };
                let target = normalize_path(&location.join(file.trim_start_matches("./")));
                if !target.starts_with(location) {
                    continue;
                }
                links.push((bin_dir.join(command), target));
            }
        }
    }

    for (path, target) in links {
        plan.insert_at(path, LayoutEntry::Link { target });
    }
}

/// Commands are single file names; a scope prefix is dropped.
fn command_name(command: &str) -> Option<&str> {
    let name = command.rsplit('/').next().unwrap_or(command);
    (!name.is_empty() && !name.starts_with('.')).then_some(name)
}
