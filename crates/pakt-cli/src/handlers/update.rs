use anyhow::Result;
use pakt_core::InstallOptions;

use super::{Operation, execute, print_header, print_report};

pub struct UpdateHandler;

impl UpdateHandler {
    pub fn handle_update_packages(
        options: InstallOptions,
        packages: &[String],
        latest: bool,
    ) -> Result<()> {
        print_header("update", packages);
        let operation = Operation::Update {
            packages: packages.to_vec(),
            latest,
        };
        let report = execute(options, operation)?;
        print_report(&report);
        Ok(())
    }
}
