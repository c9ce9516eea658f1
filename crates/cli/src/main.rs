// bomcheck CLI - headless workbook verification

mod check;
mod exit_codes;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "bomcheck")]
#[command(about = "Indent-hierarchy BOM verification for engineering workbooks")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a workbook, coloring each checked quantity cell in place
    #[command(after_help = "\
Examples:
  bomcheck check build.xlsx
  bomcheck check build.xlsx --config weekly.toml
  bomcheck check build.xlsx --dry-run --json
  bomcheck check build.xlsx --output report.json --quiet")]
    Check {
        /// Workbook to verify (annotated in place unless --dry-run)
        workbook: PathBuf,

        /// TOML config file (built-in column layout when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Run the full check without writing to the workbook
        #[arg(long)]
        dry_run: bool,

        /// Print the JSON report to stdout
        #[arg(long)]
        json: bool,

        /// Write the JSON report to a file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Suppress the human summary on stderr
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Validate a config file without touching any workbook
    #[command(after_help = "\
Examples:
  bomcheck validate weekly.toml")]
    Validate {
        /// Path to the TOML config file
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        None => {
            eprintln!("Usage: bomcheck <command> [options]");
            eprintln!("       bomcheck --help for more information");
            Err(CliError { code: EXIT_USAGE, message: String::new(), hint: None })
        }
        Some(Commands::Check { workbook, config, dry_run, json, output, quiet }) => {
            check::cmd_check(workbook, config, dry_run, json, output, quiet)
        }
        Some(Commands::Validate { config }) => check::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
