use anyhow::Result;
use pakt_core::InstallOptions;

use super::{Operation, execute, print_header, print_report};

pub struct RemoveHandler;

impl RemoveHandler {
    pub fn handle_remove_packages(options: InstallOptions, packages: &[String]) -> Result<()> {
        print_header("remove", packages);
        let report = execute(options, Operation::Remove(packages.to_vec()))?;
        print_report(&report);
        Ok(())
    }
}
