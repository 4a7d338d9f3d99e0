//! Synth command - Emit the resource graph.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use apistack_synth::{ApiStack, Emitter, OutputFormat, SynthError};

use super::{load_config, print_report, ImageArgs, RuleArgs};

#[derive(Args)]
pub struct SynthArgs {
    /// Stack configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub image: ImageArgs,

    #[command(flatten)]
    pub rules: RuleArgs,

    /// Output format (json, yaml)
    #[arg(long, default_value = "json")]
    pub format: String,

    /// Write the graph into this directory instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

pub async fn execute(args: SynthArgs) -> Result<()> {
    let format: OutputFormat = args.format.parse()?;
    let config = load_config(args.config.as_ref())?;
    let props = args.image.to_props()?;
    let rules = args.rules.load()?;

    info!("Synthesizing stack {} for image {}", config.name, props.image());

    let stack = ApiStack::new(props, config).with_rules(rules);
    let synthesis = match stack.synthesize() {
        Ok(synthesis) => synthesis,
        Err(SynthError::Validation(report)) => {
            eprintln!("❌ Stack validation failed:");
            print_report(&report);
            return Err(SynthError::Validation(report)).context("Synthesis aborted");
        }
        Err(e) => return Err(e).context("Synthesis failed"),
    };

    let graph = synthesis.graph;
    match args.out {
        Some(dir) => {
            let count = graph.len();
            let emitter = Emitter::new(dir);
            let path = tokio::task::spawn_blocking(move || emitter.write(&graph, format))
                .await
                .context("Graph writer stopped unexpectedly")?
                .context("Failed to write graph")?;
            println!("✅ Synthesized {} resources to {}", count, path.display());
        }
        None => println!("{}", Emitter::render(&graph, format)?),
    }

    Ok(())
}
