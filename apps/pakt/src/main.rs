use std::process::ExitCode;

fn main() -> ExitCode {
    match pakt_cli::run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            pakt_logger::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
