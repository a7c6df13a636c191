pub mod comparators;
pub mod engines;
pub mod graph;
pub mod peers;
pub mod platform;
pub mod resolver;
pub mod semver_range;
pub mod single_flight;
pub mod spec;
pub mod version_utils;

pub use engines::EngineContext;
pub use graph::{
    DependencyGraph, DependencySpec, Edge, GraphPackage, Importer, Owner, PackageId, PeerSpec,
    ResolvedPackage, Target, VersionConstraint,
};
pub use peers::check_peers;
pub use platform::{Platform, get_current_cpu, get_current_os};
pub use resolver::{
    DependencyResolver, ImporterManifest, Resolution, ResolveOptions, UpdateSet,
    resolved_from_metadata,
};
pub use semver_range::VersionRange;
pub use spec::merge_specs;
