//! Init command - Write the default stack configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use apistack_model::{validate_stack_name, StackConfig};

use super::CliError;

#[derive(Args)]
pub struct InitArgs {
    /// Where to write the configuration (.yaml, .yml or .toml)
    #[arg(short, long, default_value = "stack.yaml")]
    pub output: PathBuf,

    /// Stack name
    #[arg(long)]
    pub name: Option<String>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub async fn execute(args: InitArgs) -> Result<()> {
    info!("Writing default stack configuration to {:?}", args.output);

    if tokio::fs::try_exists(&args.output).await? && !args.force {
        return Err(CliError::InvalidArgs(format!(
            "{:?} already exists (use --force to overwrite)",
            args.output
        ))
        .into());
    }

    let config = match args.name {
        Some(name) => {
            validate_stack_name(&name)?;
            StackConfig::named(name)
        }
        None => StackConfig::default(),
    };
    config
        .to_file(&args.output)
        .with_context(|| format!("Failed to write {:?}", args.output))?;

    println!("✅ Wrote {}", args.output.display());
    Ok(())
}
