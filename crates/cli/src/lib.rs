pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "procurely",
    about = "Procurely operator CLI",
    long_about = "Compare vendor quotes offline, apply database migrations, and inspect effective configuration.",
    after_help = "Examples:\n  procurely compare --boq boq.json --quote acme.json --quote best-supply.json\n  procurely migrate\n  procurely config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Score quotes against a BOQ with the configured policy and print the comparison")]
    Compare {
        #[arg(long, value_name = "FILE", help = "BOQ JSON document")]
        boq: PathBuf,
        #[arg(
            long = "quote",
            value_name = "FILE",
            help = "Quote JSON document (a single quote or an array); repeat for more vendors"
        )]
        quotes: Vec<PathBuf>,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Compare { boq, quotes } => commands::compare::run(&boq, &quotes),
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
