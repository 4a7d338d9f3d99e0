//! apistack CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 5: Synthesis error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use apistack_model::ModelError;
use apistack_synth::SynthError;

mod commands;

use commands::{Cli, CliError, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const SYNTH_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "apistack=debug"
    } else if cli.quiet {
        "apistack=warn"
    } else {
        "apistack=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("warn,{}", level)));

    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init();

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args).await,
        Commands::Validate(args) => commands::validate::execute(args).await,
        Commands::Synth(args) => commands::synth::execute(args).await,
        Commands::Diff(args) => commands::diff::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(cli) = cause.downcast_ref::<CliError>() {
            return match cli {
                CliError::ValidationFailed { .. } => ExitCodes::VALIDATION_FAILURE,
                CliError::InvalidArgs(_) => ExitCodes::INVALID_ARGS,
            };
        }
        if let Some(synth) = cause.downcast_ref::<SynthError>() {
            return match synth {
                SynthError::Validation(_) => ExitCodes::VALIDATION_FAILURE,
                SynthError::Model(_) | SynthError::UnsupportedFormat(_) => ExitCodes::INVALID_ARGS,
                _ => ExitCodes::SYNTH_ERROR,
            };
        }
        if cause.downcast_ref::<ModelError>().is_some() {
            return ExitCodes::INVALID_ARGS;
        }
    }
    ExitCodes::GENERAL_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use apistack_policy::ValidationReport;

    #[test]
    fn test_categorize_error() {
        let e = anyhow::Error::new(CliError::ValidationFailed { errors: 2 });
        assert_eq!(categorize_error(&e), ExitCodes::VALIDATION_FAILURE);

        let e = anyhow::Error::new(SynthError::Validation(ValidationReport::new())).context("Synthesis failed");
        assert_eq!(categorize_error(&e), ExitCodes::VALIDATION_FAILURE);

        let e = anyhow::Error::new(SynthError::Cycle("A, B".to_string()));
        assert_eq!(categorize_error(&e), ExitCodes::SYNTH_ERROR);

        let e = anyhow::Error::new(ModelError::invalid("image_tag", "bad"));
        assert_eq!(categorize_error(&e), ExitCodes::INVALID_ARGS);

        let e = anyhow::anyhow!("something else");
        assert_eq!(categorize_error(&e), ExitCodes::GENERAL_ERROR);
    }
}
