//! The API stack definition.

use std::path::Path;

use tracing::{info, warn};

use apistack_model::{LaunchType, StackConfig, StackProps};
use apistack_policy::{RuleSet, RuleViolation, ValidationReport};

use crate::builder::StackBuilder;
use crate::error::{SynthError, SynthResult};
use crate::graph::ResourceGraph;

/// Logical ids of the stack's nodes.
pub mod ids {
    pub const NETWORK: &str = "Vpc";
    pub const CLUSTER: &str = "Cluster";
    pub const TASK_DEFINITION: &str = "TaskDef";
    pub const FARGATE_SERVICE: &str = "FargateService";
    pub const EC2_SERVICE: &str = "Ec2Service";
}

/// Output of a successful synthesis.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub graph: ResourceGraph,
    /// Findings that did not block synthesis.
    pub report: ValidationReport,
}

impl Synthesis {
    pub fn warnings(&self) -> impl Iterator<Item = &RuleViolation> {
        self.report.warnings()
    }
}

/// A network, a cluster, a single-container task definition and a service
/// exposed on the container's port.
pub struct ApiStack {
    props: StackProps,
    config: StackConfig,
    rules: RuleSet,
}

impl ApiStack {
    /// Create the stack with the standard rule set.
    pub fn new(props: StackProps, config: StackConfig) -> Self {
        Self {
            props,
            config,
            rules: RuleSet::standard(),
        }
    }

    /// Create the stack from a YAML or TOML config file.
    pub fn from_config_file(props: StackProps, path: impl AsRef<Path>) -> SynthResult<Self> {
        let config = StackConfig::from_file(path)?;
        Ok(Self::new(props, config))
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Replace the rule set with one loaded from an override file.
    pub fn with_rules_file(self, path: impl AsRef<Path>) -> SynthResult<Self> {
        let rules = RuleSet::from_file(path)?;
        Ok(self.with_rules(rules))
    }

    pub fn strict(self) -> Self {
        self.with_rules(RuleSet::strict())
    }

    pub fn props(&self) -> &StackProps {
        &self.props
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Evaluate the rule set without building anything.
    pub fn validate(&self) -> ValidationReport {
        self.rules.evaluate_with_props(&self.config, &self.props)
    }

    /// Validate, then declare every resource of the stack.
    pub fn synthesize(&self) -> SynthResult<Synthesis> {
        let report = self.validate();
        if !report.valid {
            return Err(SynthError::Validation(report));
        }
        for finding in report.warnings() {
            warn!("{}", finding);
        }

        let graph = self.build_graph()?;
        graph.check_invariants()?;

        info!(
            "Synthesized stack {} with {} resources",
            graph.stack_name,
            graph.len()
        );
        Ok(Synthesis { graph, report })
    }

    fn build_graph(&self) -> SynthResult<ResourceGraph> {
        let config = &self.config;
        let mut builder = StackBuilder::new(&config.name);

        let network = builder.network(ids::NETWORK, &config.network)?;
        let cluster = builder.cluster(ids::CLUSTER, &network, &config.cluster)?;
        let task = builder.task_definition(
            ids::TASK_DEFINITION,
            &config.task_definition,
            &self.props.image(),
            config.service.launch_type,
        )?;

        let service_id = match config.service.launch_type {
            LaunchType::Fargate => ids::FARGATE_SERVICE,
            LaunchType::Ec2 => ids::EC2_SERVICE,
        };
        let service = builder.service(service_id, &cluster, &task, &config.service)?;
        builder.allow_ingress(&service, config.ingress_port(), &config.ingress)?;

        Ok(builder.build())
    }
}
