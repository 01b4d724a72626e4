use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cqlite::repl;
use cqlite::storage::Table;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "cqlite", version = VERSION, about = "A small B+-tree backed database.")]
struct Cli {
    /// Path to the database file. Created if it does not already exist.
    database: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut table = match Table::open(&cli.database) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match repl::run(&mut table) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
