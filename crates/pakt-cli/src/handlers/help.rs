use anyhow::Result;
use clap::CommandFactory;
use owo_colors::OwoColorize;

use crate::commands::Cli;
use pakt_constants::{BIN_NAME, COMMANDS, DESCRIPTION, EXAMPLES, VERSION};

const OPTIONS: &[(&str, &str)] = &[
    ("-C, --dir <DIR>", "Workspace root holding the lockfile"),
    ("--project <PATH>", "Project root to install (repeatable)"),
    ("--node-linker <LAYOUT>", "isolated or hoisted"),
    ("--frozen-lockfile", "Fail when the lockfile is out of date"),
    ("--no-lockfile", "Neither read nor write the lockfile"),
    ("-P, --prod", "Skip devDependencies"),
    ("--engine-strict", "Fail on engine mismatches"),
    ("-s, --silent", "Only print errors"),
    ("-V, --version", "Print version"),
];

pub struct HelpHandler;

impl HelpHandler {
    pub fn handle_help(command: Option<&str>) -> Result<()> {
        match command {
            Some(cmd) => Self::show_command_help(cmd),
            None => {
                Self::show_general_help();
                Ok(())
            }
        }
    }

    fn show_command_help(command: &str) -> Result<()> {
        let mut cli = Cli::command();
        match cli.find_subcommand_mut(command) {
            Some(subcommand) => subcommand.print_help()?,
            None => {
                pakt_logger::error(&format!("Unknown command '{command}'"));
                println!();
                Self::show_general_help();
            }
        }
        println!();
        Ok(())
    }

    fn show_general_help() {
        println!("{}", DESCRIPTION.bright_white().bold());
        println!(
            "{} {}",
            "Version:".bright_white().bold(),
            VERSION.bright_black().bold()
        );
        println!();

        println!("{}", "Usage:".bright_magenta().bold());
        println!(
            "  {} {} {}",
            BIN_NAME.bright_cyan().bold(),
            "<COMMAND>".bright_white(),
            "[OPTIONS]".bright_black().bold()
        );
        println!();

        println!("{}", "Commands:".bright_magenta().bold());
        let commands: Vec<(String, &str)> = COMMANDS
            .iter()
            .map(|(cmd, desc, aliases)| {
                if aliases.is_empty() {
                    ((*cmd).to_string(), *desc)
                } else {
                    (format!("{cmd} [{}]", aliases.join(", ")), *desc)
                }
            })
            .collect();
        Self::print_rows(&commands);

        println!("{}", "Options:".bright_magenta().bold());
        let options: Vec<(String, &str)> = OPTIONS
            .iter()
            .map(|(flag, desc)| ((*flag).to_string(), *desc))
            .collect();
        Self::print_rows(&options);

        println!("{}", "Examples:".bright_magenta().bold());
        let examples: Vec<(String, &str)> = EXAMPLES
            .iter()
            .map(|(cmd, desc)| ((*cmd).to_string(), *desc))
            .collect();
        Self::print_rows(&examples);

        println!(
            "Run {} for the options of one command",
            format!("{BIN_NAME} help <command>").bright_cyan()
        );
    }

    /// Prints `left  # right` rows with the comments aligned.
    fn print_rows(rows: &[(String, &str)]) {
        let width = rows.iter().map(|(left, _)| left.len()).max().unwrap_or(0);
        for (left, right) in rows {
            println!(
                "  {}{}  # {}",
                left.bright_cyan().bold(),
                " ".repeat(width - left.len()),
                right.bright_black().bold()
            );
        }
        println!();
    }
}
