pub mod commands;
pub mod handlers;
pub mod node;

use clap::Parser;

pub use commands::{Cli, Commands, GlobalArgs};

use commands::dependency_type;
use handlers::{HelpHandler, InstallHandler, RemoveHandler, UpdateHandler};

pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    pakt_logger::init_logger(cli.global.silent);
    let mut options = cli.global.options();
    if options.node_version.is_none() {
        options.detected_node_version = node::detect_node_version();
        if let Some(version) = &options.detected_node_version {
            pakt_logger::debug(&format!("Detected node {version}"), options.debug);
        }
    }

    match cli.command {
        Commands::Install => InstallHandler::install_all(options),
        Commands::Add {
            packages,
            dev,
            optional,
            save_exact,
            save_prefix,
        } => InstallHandler::add_packages(
            options,
            &packages,
            dependency_type(dev, optional),
            save_exact,
            save_prefix,
        ),
        Commands::Remove { packages } => RemoveHandler::handle_remove_packages(options, &packages),
        Commands::Update { packages, latest } => {
            UpdateHandler::handle_update_packages(options, &packages, latest)
        }
        Commands::Help { command } => HelpHandler::handle_help(command.as_deref()),
    }
}
