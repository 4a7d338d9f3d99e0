//! Stack configuration and file loading.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::models::{ClusterSpec, IngressSpec, NetworkSpec, ServiceSpec, TaskDefinitionSpec};

/// Default stack name.
pub const DEFAULT_STACK_NAME: &str = "ApiStack";

fn stack_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,127}$").expect("stack name pattern is valid"))
}

/// Check that a stack name is a letter followed by up to 127 letters,
/// digits or hyphens.
///
/// The name ends up in output file names, so anything that could act as a
/// path component is rejected.
pub fn validate_stack_name(name: &str) -> ModelResult<()> {
    if stack_name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(ModelError::invalid(
            "name",
            format!("'{}' is not a valid stack name (letters, digits and hyphens, starting with a letter)", name),
        ))
    }
}

/// Full configuration of the API stack.
///
/// Any field missing from a config file falls back to its default, so an
/// empty file describes the default stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub name: String,
    pub network: NetworkSpec,
    pub cluster: ClusterSpec,
    pub task_definition: TaskDefinitionSpec,
    pub service: ServiceSpec,
    pub ingress: IngressSpec,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_STACK_NAME.to_string(),
            network: NetworkSpec::default(),
            cluster: ClusterSpec::default(),
            task_definition: TaskDefinitionSpec::default(),
            service: ServiceSpec::default(),
            ingress: IngressSpec::default(),
        }
    }
}

enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    fn detect(path: &Path) -> ModelResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => Err(ModelError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

impl StackConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a YAML or TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::detect(path)?;
        debug!("Reading stack config from {:?}", path);

        let content = fs::read_to_string(path)?;
        Self::parse(&content, format)
    }

    /// Parse YAML configuration.
    pub fn from_yaml(content: &str) -> ModelResult<Self> {
        Self::parse(content, ConfigFormat::Yaml)
    }

    /// Parse TOML configuration.
    pub fn from_toml(content: &str) -> ModelResult<Self> {
        Self::parse(content, ConfigFormat::Toml)
    }

    fn parse(content: &str, format: ConfigFormat) -> ModelResult<Self> {
        // serde_yaml rejects an empty document for a struct
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Toml => toml::from_str(content)?,
        };
        Ok(config)
    }

    /// Write configuration to a YAML or TOML file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> ModelResult<()> {
        let path = path.as_ref();
        let content = match ConfigFormat::detect(path)? {
            ConfigFormat::Yaml => serde_yaml::to_string(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };
        debug!("Writing stack config to {:?}", path);
        fs::write(path, content)?;
        Ok(())
    }

    /// Port the ingress rule opens.
    pub fn ingress_port(&self) -> u16 {
        self.ingress
            .effective_port(&self.task_definition.container.port_mapping)
    }
}
