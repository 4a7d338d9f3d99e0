//! CLI command definitions.
//!
//! Each subcommand maps to one step of working with the stack: write a
//! config, check it, synthesize it, or compare two variants of it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::info;

use apistack_model::{ImageRegistryRef, ImageTag, StackConfig, StackProps, DEFAULT_IMAGE_TAG};
use apistack_policy::{RuleSet, ValidationReport};

pub mod diff;
pub mod init;
pub mod synth;
pub mod validate;

/// apistack - declare and synthesize the API service stack
#[derive(Parser)]
#[command(name = "apistack")]
#[command(version, about = "apistack - declare and synthesize the API service stack")]
#[command(long_about = r#"
apistack turns a stack configuration into a declarative resource graph:
a network, a cluster, a single-container task definition, a service and
the ingress rule exposing it.

WORKFLOWS:
  init      → Write the default stack configuration
  validate  → Check a configuration against the stack rules
  synth     → Emit the resource graph as JSON or YAML
  diff      → Compare the graphs of two configurations

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  5 - Synthesis error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the default stack configuration
    Init(init::InitArgs),

    /// Validate a stack configuration
    Validate(validate::ValidateArgs),

    /// Synthesize the resource graph
    Synth(synth::SynthArgs),

    /// Compare the graphs of two configurations
    Diff(diff::DiffArgs),
}

/// Failures the CLI reports with a dedicated exit code.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("validation failed with {errors} error(s)")]
    ValidationFailed { errors: usize },

    #[error("invalid argument: {0}")]
    InvalidArgs(String),
}

/// Image registry arguments shared by commands that need `StackProps`.
#[derive(Args, Clone)]
pub struct ImageArgs {
    /// Name of the image repository
    #[arg(long)]
    pub registry: String,

    /// Explicit repository URI
    #[arg(long)]
    pub registry_uri: Option<String>,

    /// Account owning the repository
    #[arg(long)]
    pub account: Option<String>,

    /// Region of the repository
    #[arg(long)]
    pub region: Option<String>,

    /// Image tag
    #[arg(long, env = "APISTACK_IMAGE_TAG", default_value = DEFAULT_IMAGE_TAG)]
    pub tag: String,

    /// Pin the image by digest (sha256:...) instead of tag
    #[arg(long)]
    pub digest: Option<String>,
}

impl ImageArgs {
    pub fn to_props(&self) -> Result<StackProps> {
        let mut registry = ImageRegistryRef::new(&self.registry)?;
        if let Some(account) = &self.account {
            registry = registry.with_account(account);
        }
        if let Some(region) = &self.region {
            registry = registry.with_region(region);
        }
        if let Some(uri) = &self.registry_uri {
            registry = registry.with_uri(uri);
        }

        let tag = match &self.digest {
            Some(digest) => ImageTag::digest(digest)?,
            None => ImageTag::tag(&self.tag)?,
        };
        Ok(StackProps::new(registry).with_tag(tag))
    }
}

/// Rule selection shared by commands that validate.
#[derive(Args, Clone)]
pub struct RuleArgs {
    /// Promote warnings to errors
    #[arg(long)]
    pub strict: bool,

    /// YAML file with rule overrides
    #[arg(long)]
    pub rules: Option<PathBuf>,
}

impl RuleArgs {
    pub fn load(&self) -> Result<RuleSet> {
        if let Some(path) = &self.rules {
            if self.strict {
                return Err(CliError::InvalidArgs("--strict cannot be combined with --rules; set `strict: true` in the file".to_string()).into());
            }
            info!("Loading rules from {:?}", path);
            return RuleSet::from_file(path).with_context(|| format!("Failed to load rules from {:?}", path));
        }
        Ok(if self.strict {
            RuleSet::strict()
        } else {
            RuleSet::standard()
        })
    }
}

/// Load a config file, or the default stack when none is given.
pub fn load_config(path: Option<&PathBuf>) -> Result<StackConfig> {
    match path {
        Some(path) => {
            info!("Loading stack config from {:?}", path);
            StackConfig::from_file(path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        None => {
            info!("No config given, using the default stack");
            Ok(StackConfig::default())
        }
    }
}

/// Print a report in the text layout shared by `validate` and `synth`.
pub fn print_report(report: &ValidationReport) {
    for v in report.errors() {
        println!("   ❌ {}: {} ({})", v.field, v.message, v.rule_id);
    }
    for v in report.warnings() {
        println!("   ⚠️  {}: {} ({})", v.field, v.message, v.rule_id);
    }
    for v in report.infos() {
        println!("   ℹ️  {}: {} ({})", v.field, v.message, v.rule_id);
    }
}
