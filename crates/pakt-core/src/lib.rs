pub mod fetch;
pub mod install;
pub mod linker;
pub mod lockfile;
pub mod options;
pub mod workspace;

pub use fetch::{FetchedPackages, fetch_packages};
pub use install::{InstallManager, InstallReport, block_on};
pub use linker::{LinkReport, Linker, ModulesState, resolve_on_disk};
pub use lockfile::{divergences, graph_to_lockfile, lockfile_to_graph};
pub use options::{EffectiveConfig, InstallOptions};
pub use workspace::{importer_id, load_importers};

pub fn install(options: InstallOptions) -> anyhow::Result<InstallReport> {
    let manager = InstallManager::new(options);
    block_on(manager.install()).map_err(|e| anyhow::anyhow!(e))
}

pub fn add(options: InstallOptions, specs: &[String]) -> anyhow::Result<InstallReport> {
    let manager = InstallManager::new(options);
    block_on(manager.add(specs)).map_err(|e| anyhow::anyhow!(e))
}

pub fn remove(options: InstallOptions, names: &[String]) -> anyhow::Result<InstallReport> {
    let manager = InstallManager::new(options);
    block_on(manager.remove(names)).map_err(|e| anyhow::anyhow!(e))
}

pub fn update(
    options: InstallOptions,
    names: &[String],
    latest: bool,
) -> anyhow::Result<InstallReport> {
    let manager = InstallManager::new(options);
    block_on(manager.update(names, latest)).map_err(|e| anyhow::anyhow!(e))
}
