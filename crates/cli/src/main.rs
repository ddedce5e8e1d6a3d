use std::process::ExitCode;

fn main() -> ExitCode {
    procurely_cli::run()
}
