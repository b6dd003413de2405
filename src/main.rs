use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sqlwrap::{Database, OpenMode, settings};

#[derive(Parser)]
#[command(
    name = "settings-reset",
    about = "Drop and recreate the settings table"
)]
struct Cli {
    /// Store file to reset. Created if it does not exist.
    #[arg(short = 'f', long = "file", default_value = settings::DEFAULT_DB)]
    file: PathBuf,
}

fn run(cli: &Cli) -> Result<(), (&'static str, sqlwrap::Error)> {
    let db = Database::open(&cli.file, OpenMode::ReadWriteCreate).map_err(|e| ("open", e))?;
    settings::reset(&db).map_err(|e| ("reset", e))?;
    db.close().map_err(|e| ("close", e))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    tracing::info!(file = %cli.file.display(), "resetting settings database");
    if !cli.file.exists() {
        tracing::info!(file = %cli.file.display(), "database does not exist, will be created");
    }

    match run(&cli) {
        Ok(()) => {
            tracing::info!(table = settings::SETTINGS_TABLE, "settings table recreated");
            ExitCode::SUCCESS
        }
        Err((operation, err)) => {
            eprintln!("error: {operation}: {err}");
            ExitCode::FAILURE
        }
    }
}
