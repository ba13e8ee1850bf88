use clap::Parser;
use sortwise::cli::{self, Cli};
use sortwise::logging::init_logging;
use sortwise::output::OutputFormatter;
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    // A missing .env file is fine; the API key may come from the environment.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match cli::load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            OutputFormatter::error(&format!("Error loading configuration: {e}"));
            return ExitCode::FAILURE;
        }
    };

    let log_file = cli.log_file.clone().or_else(|| config.logging.file.clone());
    let _guard = init_logging(cli.verbose, log_file.as_deref());

    match cli::run(&cli, config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run aborted");
            OutputFormatter::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
