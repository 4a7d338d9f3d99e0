//! Writing synthesized graphs to disk.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::info;

use apistack_model::validate_stack_name;

use crate::error::{SynthError, SynthResult};
use crate::graph::ResourceGraph;

/// Serialization format for emitted graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(SynthError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Emits graphs into an output directory as `<stack>.graph.<ext>`.
pub struct Emitter {
    out_dir: PathBuf,
}

impl Emitter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Serialize a graph without touching the filesystem.
    pub fn render(graph: &ResourceGraph, format: OutputFormat) -> SynthResult<String> {
        match format {
            OutputFormat::Json => graph.to_json(),
            OutputFormat::Yaml => graph.to_yaml(),
        }
    }

    /// Path the graph would be written to.
    ///
    /// Fails when the stack name could escape the output directory.
    pub fn path_for(&self, graph: &ResourceGraph, format: OutputFormat) -> SynthResult<PathBuf> {
        validate_stack_name(&graph.stack_name)?;
        Ok(self
            .out_dir
            .join(format!("{}.graph.{}", graph.stack_name, format.extension())))
    }

    /// Write the graph and return the file path.
    pub fn write(&self, graph: &ResourceGraph, format: OutputFormat) -> SynthResult<PathBuf> {
        let path = self.path_for(graph, format)?;
        fs::create_dir_all(&self.out_dir)?;
        fs::write(&path, Self::render(graph, format)?)?;
        info!("Wrote {} resources to {:?}", graph.len(), path);
        Ok(path)
    }
}
