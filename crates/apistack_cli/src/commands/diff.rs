//! Diff command - Compare the graphs of two configurations.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use apistack_model::ImageTag;
use apistack_synth::{ApiStack, GraphDiff};

use super::{load_config, CliError, ImageArgs, RuleArgs};

#[derive(Args)]
pub struct DiffArgs {
    /// Baseline configuration (defaults to the built-in stack)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Configuration to compare against the baseline
    #[arg(long)]
    pub against: Option<PathBuf>,

    /// Image tag for the compared graph (defaults to --tag)
    #[arg(long, conflicts_with = "against_digest")]
    pub against_tag: Option<String>,

    /// Image digest (sha256:...) for the compared graph
    #[arg(long)]
    pub against_digest: Option<String>,

    #[command(flatten)]
    pub image: ImageArgs,

    #[command(flatten)]
    pub rules: RuleArgs,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: String,
}

pub async fn execute(args: DiffArgs) -> Result<()> {
    let diff = compare(&args)?;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&diff).context("Failed to serialize diff")?),
        "text" => print!("{}", diff),
        other => return Err(CliError::InvalidArgs(format!("unknown format '{}'", other)).into()),
    }
    Ok(())
}

fn compare(args: &DiffArgs) -> Result<GraphDiff> {
    if args.against.is_none() && args.against_tag.is_none() && args.against_digest.is_none() {
        return Err(CliError::InvalidArgs(
            "nothing to compare: pass --against, --against-tag or --against-digest".to_string(),
        )
        .into());
    }

    let rules = args.rules.load()?;
    let props = args.image.to_props()?;
    let after_props = match (&args.against_tag, &args.against_digest) {
        (Some(tag), _) => props.clone().with_tag(ImageTag::tag(tag)?),
        (None, Some(digest)) => props.clone().with_tag(ImageTag::digest(digest)?),
        (None, None) => props.clone(),
    };

    let before_config = load_config(args.config.as_ref())?;
    let after_config = match &args.against {
        Some(path) => load_config(Some(path))?,
        None => before_config.clone(),
    };

    info!("Comparing {} against {}", before_config.name, after_config.name);

    let before = ApiStack::new(props, before_config)
        .with_rules(rules.clone())
        .synthesize()
        .context("Failed to synthesize baseline")?;
    let after = ApiStack::new(after_props, after_config)
        .with_rules(rules)
        .synthesize()
        .context("Failed to synthesize comparison")?;

    Ok(GraphDiff::between(&before.graph, &after.graph)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use apistack_synth::LogicalId;
    use tempfile::tempdir;

    const DIGEST: &str = "sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn args() -> DiffArgs {
        DiffArgs {
            config: None,
            against: None,
            against_tag: None,
            against_digest: None,
            image: ImageArgs {
                registry: "api".to_string(),
                registry_uri: None,
                account: None,
                region: None,
                tag: "latest".to_string(),
                digest: None,
            },
            rules: RuleArgs {
                strict: false,
                rules: None,
            },
            format: "text".to_string(),
        }
    }

    #[tokio::test]
    async fn test_diff_needs_something_to_compare() {
        let err = execute(args()).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::InvalidArgs(_))));
    }

    #[tokio::test]
    async fn test_diff_against_tag() {
        let mut args = args();
        args.against_tag = Some("v2".to_string());

        let diff = compare(&args).unwrap();
        assert!(diff.added.is_empty() && diff.removed.is_empty());
        assert_eq!(diff.changed_ids(), vec![&LogicalId::new("TaskDef")]);
        assert_eq!(diff.changed[0].paths, vec!["/resource/container/image"]);

        args.format = "json".to_string();
        execute(args).await.unwrap();
    }

    #[tokio::test]
    async fn test_diff_against_digest() {
        let mut args = args();
        args.against_digest = Some(DIGEST.to_string());

        let diff = compare(&args).unwrap();
        assert_eq!(diff.changed_ids(), vec![&LogicalId::new("TaskDef")]);

        args.against_digest = Some("sha256:short".to_string());
        assert!(compare(&args).is_err());
    }

    #[tokio::test]
    async fn test_diff_against_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("other.yaml");
        std::fs::write(&path, "network:\n  max_availability_zones: 2\n").unwrap();

        let mut args = args();
        args.against = Some(path);
        let diff = compare(&args).unwrap();
        assert_eq!(diff.changed_ids(), vec![&LogicalId::new("Vpc")]);
        assert_eq!(diff.changed[0].paths, vec!["/resource/max_availability_zones"]);
    }

    #[test]
    fn test_tag_and_digest_conflict() {
        use clap::Parser;

        let result = crate::commands::Cli::try_parse_from([
            "apistack",
            "diff",
            "--registry",
            "api",
            "--against-tag",
            "v2",
            "--against-digest",
            DIGEST,
        ]);
        assert!(result.is_err());
    }
}
