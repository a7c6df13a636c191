pub mod help;
pub mod install;
pub mod remove;
pub mod update;

pub use help::HelpHandler;
pub use install::InstallHandler;
pub use remove::RemoveHandler;
pub use update::UpdateHandler;

use anyhow::Result;
use owo_colors::OwoColorize;
use pakt_core::{InstallManager, InstallOptions, InstallReport};
use pakt_constants::BIN_NAME;
use tokio_util::sync::CancellationToken;

/// One mutation or install run by the engine.
pub enum Operation {
    Install,
    Add(Vec<String>),
    Remove(Vec<String>),
    Update { packages: Vec<String>, latest: bool },
}

/// Runs `operation` on a fresh runtime; Ctrl-C cancels in-flight work.
pub fn execute(options: InstallOptions, operation: Operation) -> Result<InstallReport> {
    let runtime = tokio::runtime::Runtime::new()?;
    let cancel = CancellationToken::new();
    let manager = InstallManager::new(options).with_cancellation(cancel.clone());

    runtime.block_on(async {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                pakt_logger::warn("Interrupted, stopping");
                cancel.cancel();
            }
        });

        let report = match operation {
            Operation::Install => manager.install().await,
            Operation::Add(specs) => manager.add(&specs).await,
            Operation::Remove(names) => manager.remove(&names).await,
            Operation::Update { packages, latest } => manager.update(&packages, latest).await,
        }?;
        Ok(report)
    })
}

pub fn print_header(command: &str, args: &[String]) {
    println!(
        "{} {} {}",
        BIN_NAME.bright_cyan().bold(),
        command.bright_white(),
        args.join(" ").bright_white()
    );
    println!();
}

pub fn print_report(report: &InstallReport) {
    for warning in &report.warnings {
        pakt_logger::warn(warning);
    }
    pakt_logger::finish(&report.summary());
}
