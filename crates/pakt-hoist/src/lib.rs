pub mod bins;
pub mod hoisted;
pub mod isolated;
pub mod plan;
pub mod strategy;

#[cfg(test)]
mod test_graph;

pub use bins::plan_bins;
pub use hoisted::{HoistGroup, hoist_groups, plan_hoisted};
pub use isolated::{plan_isolated, virtual_store_dir, virtual_store_name, virtual_store_path};
pub use plan::{LayoutEntry, LayoutPlan, PlannedEntry};
pub use strategy::LinkingStrategy;

use pakt_resolver::DependencyGraph;
use std::path::Path;

/// Computes the full layout, bin links included, for `graph` under `root`.
#[must_use]
pub fn plan_layout(graph: &DependencyGraph, strategy: LinkingStrategy, root: &Path) -> LayoutPlan {
    let mut plan = match strategy {
        LinkingStrategy::Hoisted => plan_hoisted(graph, root),
        LinkingStrategy::Isolated => plan_isolated(graph, root),
    };
    plan_bins(&mut plan, graph);
    plan
}
