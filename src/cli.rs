//! Command-line interface module for sortwise.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing (`clap`)
//! - Interactive prompts when no directory is given
//! - Choosing the classification scheme
//! - Wiring configuration, oracles and the pipeline together

use crate::config::{ConfigError, OrganizerConfig};
use crate::error::OrganizeError;
use crate::oracle::{Oracles, scheme_from_description};
use crate::output::{CliReporter, OutputFormatter};
use crate::pipeline::{Pipeline, PipelineOptions, RunReport};
use crate::scheme::ClassificationScheme;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Organize a directory: retire old and useless files, drop duplicates,
/// then classify, rename and move everything else into category folders.
#[derive(Debug, Clone, Parser)]
#[command(name = "sortwise", version, about)]
pub struct Cli {
    /// Directory to organize. Prompts interactively when omitted.
    pub path: Option<PathBuf>,

    /// Describe the folder layout you want; an AI model turns it into a scheme.
    #[arg(long, value_name = "TEXT", conflicts_with = "scheme")]
    pub describe: Option<String>,

    /// JSON classification scheme, e.g. {".pdf": ["Documents", "Reports"]}.
    #[arg(long, value_name = "FILE")]
    pub scheme: Option<PathBuf>,

    /// Configuration file (default: ./.sortwiserc.toml, then ~/.config/sortwise/config.toml).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show what would happen without touching any file.
    #[arg(long)]
    pub dry_run: bool,

    /// Delete files not modified for more than this many days.
    #[arg(long, value_name = "N", conflicts_with = "no_age_limit")]
    pub max_age_days: Option<u64>,

    /// Never delete files for being old.
    #[arg(long)]
    pub no_age_limit: bool,

    /// Worker threads for reading and classifying files (0 = one per CPU).
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Also write the log to this file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Errors that end the program with a failure exit code.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Organize(#[from] OrganizeError),

    #[error("could not read input: {0}")]
    Prompt(#[from] io::Error),

    #[error("no directory given")]
    NoDirectory,
}

/// Loads configuration and applies command-line overrides on top.
pub fn load_config(cli: &Cli) -> Result<OrganizerConfig, CliError> {
    let mut config = OrganizerConfig::load(cli.config.as_deref())?;
    if let Some(days) = cli.max_age_days {
        config.retention.max_age_days = days;
    }
    if cli.no_age_limit {
        config.retention.max_age_days = 0;
    }
    if let Some(workers) = cli.workers {
        config.pipeline.workers = workers;
    }
    Ok(config)
}

/// Runs one organization with the given configuration.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use sortwise::cli::{Cli, load_config, run};
///
/// let cli = Cli::parse_from(["sortwise", "/path/to/Downloads", "--dry-run"]);
/// let config = load_config(&cli).unwrap();
/// let report = run(&cli, config).unwrap();
/// println!("{} files moved", report.moved());
/// ```
pub fn run(cli: &Cli, config: OrganizerConfig) -> Result<RunReport, CliError> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    let interactive = cli.path.is_none();
    let target = match &cli.path {
        Some(path) => path.clone(),
        None => {
            let answer = prompt(
                &mut input,
                &mut output,
                "Enter the directory path to organize: ",
            )?;
            if answer.is_empty() {
                return Err(CliError::NoDirectory);
            }
            PathBuf::from(answer)
        }
    };

    let filters = config.filters.compile()?;
    let oracles = Oracles::from_settings(&config.oracle);
    let scheme = choose_scheme(cli, &config, &oracles, interactive, &mut input, &mut output)?;

    OutputFormatter::header("Classification scheme");
    OutputFormatter::info(&scheme.to_string());

    let mut options = PipelineOptions::from_config(&config);
    options.dry_run = cli.dry_run;

    if cli.dry_run {
        OutputFormatter::dry_run_notice(&format!("Analyzing {}", target.display()));
    } else {
        OutputFormatter::info(&format!("Organizing {}", target.display()));
    }

    let pipeline = Pipeline::new(options, filters, oracles, scheme)
        .with_reporter(Arc::new(CliReporter::new()));
    let report = pipeline.run(&target)?;

    OutputFormatter::header("Files");
    OutputFormatter::file_listing(&report);
    OutputFormatter::summary_table(&report);
    if report.dry_run {
        OutputFormatter::dry_run_notice("No files were modified.");
    } else {
        OutputFormatter::success("Organization complete.");
    }
    Ok(report)
}

/// Picks the scheme, first match wins:
/// `--scheme` file, `--describe` text, `[scheme]` in the configuration,
/// and in interactive mode the custom-scheme prompts. Otherwise empty.
fn choose_scheme<R: BufRead, W: Write>(
    cli: &Cli,
    config: &OrganizerConfig,
    oracles: &Oracles,
    interactive: bool,
    input: &mut R,
    output: &mut W,
) -> Result<ClassificationScheme, CliError> {
    if let Some(path) = &cli.scheme {
        info!(path = %path.display(), "using scheme file");
        return Ok(ClassificationScheme::from_json_file(path)?);
    }

    if let Some(description) = &cli.describe {
        return Ok(scheme_from_description(oracles, description));
    }

    if !config.scheme.is_empty() {
        return Ok(ClassificationScheme::from_entries(config.scheme.clone())?);
    }

    if interactive && ask_custom_scheme(input, output)? {
        let description = prompt(
            input,
            output,
            "Describe how you would like your files organized: ",
        )?;
        if !description.is_empty() {
            return Ok(scheme_from_description(oracles, &description));
        }
    }

    Ok(ClassificationScheme::new())
}

fn ask_custom_scheme<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<bool> {
    let answer = prompt(
        input,
        output,
        "Do you want to use a custom categorization scheme? (y/n): ",
    )?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}

/// Writes `question` and reads one trimmed line. End of input reads as empty.
fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<String> {
    write!(output, "{question}")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}
