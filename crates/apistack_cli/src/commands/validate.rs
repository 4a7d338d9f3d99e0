//! Validate command - Check a stack configuration against the rules.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use apistack_model::StackConfig;
use apistack_policy::ValidationReport;

use super::{load_config, print_report, CliError, ImageArgs, RuleArgs};

#[derive(Args)]
pub struct ValidateArgs {
    /// Stack configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Name of the image repository; enables image rules
    #[arg(long)]
    pub registry: Option<String>,

    /// Image tag, checked when --registry is given
    #[arg(long, env = "APISTACK_IMAGE_TAG", default_value = apistack_model::DEFAULT_IMAGE_TAG)]
    pub tag: String,

    /// Pin the image by digest (sha256:...)
    #[arg(long)]
    pub digest: Option<String>,

    #[command(flatten)]
    pub rules: RuleArgs,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: String,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    let (config, report) = evaluate(&args)?;

    match args.format.as_str() {
        "json" => println!("{}", report_json(&report)?),
        "text" => {
            println!("🔒 Validating stack {}...", config.name);
            print_report(&report);
            println!();
            if report.valid {
                println!("✅ All validations passed!");
            } else {
                println!("❌ Some validations failed. Please fix the issues above.");
            }
        }
        other => return Err(CliError::InvalidArgs(format!("unknown format '{}'", other)).into()),
    }

    if !report.valid {
        return Err(CliError::ValidationFailed {
            errors: report.error_count(),
        }
        .into());
    }
    Ok(())
}

fn evaluate(args: &ValidateArgs) -> Result<(StackConfig, ValidationReport)> {
    let config = load_config(args.config.as_ref())?;
    let rules = args.rules.load()?;
    info!("Validating stack {} with {}", config.name, rules.name);

    let report = match &args.registry {
        Some(registry) => {
            let image = ImageArgs {
                registry: registry.clone(),
                registry_uri: None,
                account: None,
                region: None,
                tag: args.tag.clone(),
                digest: args.digest.clone(),
            };
            rules.evaluate_with_props(&config, &image.to_props()?)
        }
        None => rules.evaluate(&config),
    };
    Ok((config, report))
}

fn report_json(report: &ValidationReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args(config: Option<PathBuf>, format: &str) -> ValidateArgs {
        ValidateArgs {
            config,
            registry: None,
            tag: "latest".to_string(),
            digest: None,
            rules: RuleArgs {
                strict: false,
                rules: None,
            },
            format: format.to_string(),
        }
    }

    #[tokio::test]
    async fn test_validate_default_passes() {
        execute(args(None, "text")).await.unwrap();
        execute(args(None, "json")).await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_fails_on_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stack.yaml");
        std::fs::write(&path, "ingress:\n  port: 443\n").unwrap();

        let err = execute(args(Some(path), "text")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::ValidationFailed { errors: 1 })
        ));
    }

    #[tokio::test]
    async fn test_validate_json_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stack.yaml");
        std::fs::write(&path, "name: ../escaped\n").unwrap();

        let (_, report) = evaluate(&args(Some(path), "json")).unwrap();
        let json = report_json(&report).unwrap();
        let parsed: ValidationReport = serde_json::from_str(&json).unwrap();
        assert!(!parsed.valid);
        assert!(parsed.has_rule("stack-name"));
        assert!(json.contains("\"field\": \"name\""));
    }

    #[tokio::test]
    async fn test_validate_image_rules_need_registry() {
        let mut with_registry = args(None, "json");
        with_registry.registry = Some("api".to_string());
        let (_, report) = evaluate(&with_registry).unwrap();
        assert!(report.has_rule("mutable-image-tag"));

        let (_, report) = evaluate(&args(None, "json")).unwrap();
        assert!(!report.has_rule("mutable-image-tag"));
    }

    #[tokio::test]
    async fn test_validate_unknown_format() {
        let err = execute(args(None, "xml")).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::InvalidArgs(_))));
    }
}
