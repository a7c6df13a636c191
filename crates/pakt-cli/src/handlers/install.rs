use anyhow::Result;
use pakt_core::InstallOptions;
use pakt_project::DependencyType;

use super::{Operation, execute, print_header, print_report};

pub struct InstallHandler;

impl InstallHandler {
    pub fn install_all(options: InstallOptions) -> Result<()> {
        print_header("install", &[]);
        let report = execute(options, Operation::Install)?;
        print_report(&report);
        Ok(())
    }

    pub fn add_packages(
        mut options: InstallOptions,
        packages: &[String],
        dependency_type: DependencyType,
        save_exact: bool,
        save_prefix: Option<String>,
    ) -> Result<()> {
        options.dependency_type = dependency_type;
        if save_exact {
            options.save_exact = Some(true);
        }
        if save_prefix.is_some() {
            options.save_prefix = save_prefix;
        }

        print_header("add", packages);
        let report = execute(options, Operation::Add(packages.to_vec()))?;
        print_report(&report);
        Ok(())
    }
}
