use std::process::ExitCode;

use clap::{Parser, Subcommand};

use convoy::commands::resume::ResumeArgs;
use convoy::commands::start::StartArgs;
use convoy::commands::status::StatusArgs;
use convoy::{commands, error, telemetry};

#[derive(Debug, Parser)]
#[command(
    name = "convoy",
    version,
    about = "Batch feature processing with worktree isolation and resumable checkpoints"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start a new batch from a features file or issue ids
    Start(StartArgs),
    /// Resume a checkpointed batch
    Resume(ResumeArgs),
    /// List checkpoints, or show one batch in detail
    Status(StatusArgs),
    /// Print the JSON Schema for .convoy.toml
    Schema,
}

impl Commands {
    const fn name(&self) -> &'static str {
        match self {
            Self::Start(_) => "start",
            Self::Resume(_) => "resume",
            Self::Status(_) => "status",
            Self::Schema => "schema",
        }
    }
}

fn main() -> ExitCode {
    telemetry::init();

    let cli = Cli::parse();

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Start(args) => args.execute(),
        Commands::Resume(args) => args.execute(),
        Commands::Status(args) => args.execute(),
        Commands::Schema => commands::schema::run_schema(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(exit_err) = e.downcast_ref::<error::ExitError>() {
                eprintln!("error: {exit_err}");
                exit_err.exit_code()
            } else {
                eprintln!("error: {e:#}");
                ExitCode::FAILURE
            }
        }
    }
}
