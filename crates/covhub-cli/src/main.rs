//! covhub CLI binary

use clap::Parser;
use covhub_cli::{handlers, logging, Cli, CliResult, Commands, Verbosity};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    logging::init_tracing(verbosity, cli.log_json);

    match cli.command {
        Commands::Serve(args) => handlers::execute_serve(&args, verbosity),
        Commands::Report(args) => handlers::execute_report(&args).map(|_| ()),
    }
}
