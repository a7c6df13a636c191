use clap::{Args, Parser, Subcommand};
use pakt_constants::DEFAULT_REGISTRY;
use pakt_core::InstallOptions;
use pakt_hoist::LinkingStrategy;
use pakt_project::DependencyType;
use pakt_store::ImportMethod;
use pakt_symcap::ConcurrencyLimits;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pakt")]
#[command(version)]
#[command(propagate_version = true)]
#[command(about = "Resolves, hoists and links node_modules for a workspace", long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Installs all dependencies of the workspace projects
    #[command(alias = "i")]
    Install,
    /// Adds packages to a project and installs them
    Add {
        /// Packages to add (e.g. lodash, lodash@^4, old@npm:lodash@^3)
        #[arg(required = true)]
        packages: Vec<String>,
        /// Save as devDependency
        #[arg(short = 'D', long = "dev", alias = "save-dev")]
        dev: bool,
        /// Save as optionalDependency
        #[arg(short = 'O', long = "optional", alias = "save-optional")]
        optional: bool,
        /// Save the exact version instead of a range
        #[arg(short = 'E', long = "save-exact")]
        save_exact: bool,
        /// Prefix of saved ranges
        #[arg(long = "save-prefix")]
        save_prefix: Option<String>,
    },
    /// Removes packages from a project
    #[command(aliases = ["rm", "uninstall"])]
    Remove {
        /// Packages to remove
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Re-resolves packages ignoring the lockfile
    #[command(aliases = ["up", "upgrade"])]
    Update {
        /// Packages to update (all when empty)
        #[arg()]
        packages: Vec<String>,
        /// Move direct dependencies to their latest version
        #[arg(short = 'L', long)]
        latest: bool,
    },
    /// Shows help for pakt or one of its commands
    Help {
        /// The command to show help for
        #[arg()]
        command: Option<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Workspace root holding the lockfile
    #[arg(short = 'C', long = "dir", global = true, default_value = ".")]
    pub dir: PathBuf,
    /// Project roots to install, relative to the workspace root (repeatable)
    #[arg(long = "project", global = true)]
    pub projects: Vec<PathBuf>,
    /// Project edited by add, remove and update --latest
    #[arg(long = "target", global = true)]
    pub target: Option<PathBuf>,
    /// node_modules layout: isolated or hoisted
    #[arg(long = "node-linker", global = true)]
    pub node_linker: Option<LinkingStrategy>,
    /// Fail instead of updating an out-of-date lockfile
    #[arg(long = "frozen-lockfile", global = true)]
    pub frozen_lockfile: bool,
    /// Neither read nor write the lockfile
    #[arg(long = "no-lockfile", global = true)]
    pub no_lockfile: bool,
    /// Skip devDependencies
    #[arg(short = 'P', long = "prod", alias = "production", global = true)]
    pub production: bool,
    /// Fail on packages whose engines do not match
    #[arg(long = "engine-strict", global = true)]
    pub engine_strict: bool,
    /// Runtime version checked against `engines.node`
    #[arg(long = "node-version", global = true)]
    pub node_version: Option<String>,
    #[arg(long = "store-dir", global = true)]
    pub store_dir: Option<PathBuf>,
    #[arg(long, global = true, default_value = DEFAULT_REGISTRY)]
    pub registry: String,
    /// auto, hardlink or copy
    #[arg(long = "package-import-method", global = true)]
    pub import_method: Option<ImportMethod>,
    /// Trust store entries without re-hashing their files
    #[arg(long = "no-verify-store-integrity", global = true)]
    pub no_verify_store_integrity: bool,
    /// Concurrent tarball downloads
    #[arg(long = "network-concurrency", global = true)]
    pub network_concurrency: Option<usize>,
    /// Only print errors
    #[arg(short = 's', long = "silent", alias = "quiet", global = true)]
    pub silent: bool,
    /// Enable debug mode for verbose output
    #[arg(long, global = true)]
    pub debug: bool,
}

impl GlobalArgs {
    pub fn options(&self) -> InstallOptions {
        let mut concurrency = ConcurrencyLimits::default();
        if let Some(fetch) = self.network_concurrency {
            concurrency.fetch = fetch;
        }

        InstallOptions {
            workspace_dir: self.dir.clone(),
            project_roots: self.projects.clone(),
            target_project: self.target.clone(),
            strategy: self.node_linker,
            frozen_lockfile: self.frozen_lockfile,
            use_lockfile: !self.no_lockfile,
            engine_strict: self.engine_strict.then_some(true),
            node_version: self.node_version.clone(),
            store_dir: self.store_dir.clone(),
            registry: self.registry.clone(),
            production: self.production,
            import_method: self.import_method,
            verify_store_integrity: self.no_verify_store_integrity.then_some(false),
            concurrency: concurrency.normalized(),
            debug: self.debug,
            ..InstallOptions::default()
        }
    }
}

pub const fn dependency_type(dev: bool, optional: bool) -> DependencyType {
    if dev {
        DependencyType::DevDependencies
    } else if optional {
        DependencyType::OptionalDependencies
    } else {
        DependencyType::Dependencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_map_to_install_options() {
        let cli = Cli::parse_from([
            "pakt",
            "install",
            "--node-linker",
            "hoisted",
            "--frozen-lockfile",
            "--engine-strict",
            "--project",
            "packages/app",
            "--network-concurrency",
            "3",
        ]);
        let options = cli.global.options();
        assert_eq!(options.strategy, Some(LinkingStrategy::Hoisted));
        assert!(options.frozen_lockfile);
        assert!(options.use_lockfile);
        assert_eq!(options.engine_strict, Some(true));
        assert_eq!(options.project_roots, vec![PathBuf::from("packages/app")]);
        assert_eq!(options.concurrency.fetch, 3);
        assert_eq!(options.verify_store_integrity, None);
    }

    #[test]
    fn add_flags_are_parsed() {
        let cli = Cli::parse_from(["pakt", "add", "lodash", "-D", "-E"]);
        match cli.command {
            Commands::Add {
                packages,
                dev,
                optional,
                save_exact,
                ..
            } => {
                assert_eq!(packages, vec!["lodash".to_string()]);
                assert_eq!(dependency_type(dev, optional), DependencyType::DevDependencies);
                assert!(save_exact);
            }
            _ => panic!("expected add"),
        }
    }
}
