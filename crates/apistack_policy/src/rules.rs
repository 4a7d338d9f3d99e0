//! Stack rules and rule sets.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use apistack_model::{validate_stack_name, ImageTag, LaunchType, ModelError, StackConfig, StackProps};

use crate::error::{PolicyError, PolicyResult};
use crate::report::{RuleSeverity, RuleViolation, ValidationReport};

/// Largest number of availability zones a network may span.
pub const MAX_AVAILABILITY_ZONES: u8 = 6;

/// A stack rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub severity: RuleSeverity,
    pub rule_type: RuleType,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

/// Types of rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    StackName,
    IngressPortMatchesContainer,
    ContainerMemoryWithinTask,
    HealthCheckTimeoutBelowInterval,
    HealthCheckBounds,
    AvailabilityZonesBounded,
    ClusterCapacityBounds,
    UnusedClusterCapacity,
    Ec2RequiresCapacity,
    FargateCpuMemory,
    MutableImageTag,
    LogConfig,
    ContainerDefinition,
    PublicIngress,
}

impl RuleType {
    fn all() -> [RuleType; 14] {
        [
            RuleType::StackName,
            RuleType::IngressPortMatchesContainer,
            RuleType::ContainerMemoryWithinTask,
            RuleType::HealthCheckTimeoutBelowInterval,
            RuleType::HealthCheckBounds,
            RuleType::AvailabilityZonesBounded,
            RuleType::ClusterCapacityBounds,
            RuleType::UnusedClusterCapacity,
            RuleType::Ec2RequiresCapacity,
            RuleType::FargateCpuMemory,
            RuleType::MutableImageTag,
            RuleType::LogConfig,
            RuleType::ContainerDefinition,
            RuleType::PublicIngress,
        ]
    }

    /// Stable identifier used in reports and override files.
    pub fn id(&self) -> &'static str {
        match self {
            RuleType::StackName => "stack-name",
            RuleType::IngressPortMatchesContainer => "ingress-port-matches-container",
            RuleType::ContainerMemoryWithinTask => "container-memory-within-task",
            RuleType::HealthCheckTimeoutBelowInterval => "health-check-timeout-below-interval",
            RuleType::HealthCheckBounds => "health-check-bounds",
            RuleType::AvailabilityZonesBounded => "availability-zones-bounded",
            RuleType::ClusterCapacityBounds => "cluster-capacity-bounds",
            RuleType::UnusedClusterCapacity => "unused-cluster-capacity",
            RuleType::Ec2RequiresCapacity => "ec2-requires-capacity",
            RuleType::FargateCpuMemory => "fargate-cpu-memory",
            RuleType::MutableImageTag => "mutable-image-tag",
            RuleType::LogConfig => "log-config",
            RuleType::ContainerDefinition => "container-definition",
            RuleType::PublicIngress => "public-ingress",
        }
    }

    fn describe(&self) -> (&'static str, &'static str) {
        match self {
            RuleType::StackName => (
                "Stack Name",
                "Stack names start with a letter and contain only letters, digits and hyphens",
            ),
            RuleType::IngressPortMatchesContainer => (
                "Ingress Port Matches Container",
                "The ingress rule must open the port and protocol the container is mapped on",
            ),
            RuleType::ContainerMemoryWithinTask => (
                "Container Memory Within Task",
                "A container cannot reserve more memory than its task definition provides",
            ),
            RuleType::HealthCheckTimeoutBelowInterval => (
                "Health Check Timeout Below Interval",
                "A probe must time out before the next one is due",
            ),
            RuleType::HealthCheckBounds => (
                "Health Check Bounds",
                "Health check timings and retries must fall inside the scheduler's accepted ranges",
            ),
            RuleType::AvailabilityZonesBounded => (
                "Availability Zones Bounded",
                "The network must span at least one and at most six availability zones",
            ),
            RuleType::ClusterCapacityBounds => (
                "Cluster Capacity Bounds",
                "Desired capacity cannot exceed maximum capacity",
            ),
            RuleType::UnusedClusterCapacity => (
                "Unused Cluster Capacity",
                "EC2 capacity is provisioned but the service runs on Fargate",
            ),
            RuleType::Ec2RequiresCapacity => (
                "EC2 Requires Capacity",
                "An EC2 service needs cluster capacity to be scheduled on",
            ),
            RuleType::FargateCpuMemory => (
                "Fargate CPU/Memory Combination",
                "Fargate tasks only accept specific CPU and memory pairs",
            ),
            RuleType::MutableImageTag => (
                "Mutable Image Tag",
                "Images referenced by tag can change between deployments; pin a digest",
            ),
            RuleType::LogConfig => (
                "Log Configuration",
                "Log stream prefix must be a valid stream name and the buffer must be non-empty",
            ),
            RuleType::ContainerDefinition => (
                "Container Definition",
                "Container needs a name, a non-zero port and a non-zero memory limit",
            ),
            RuleType::PublicIngress => (
                "Public Ingress",
                "The service accepts traffic from any IPv4 address",
            ),
        }
    }

    fn standard_severity(&self) -> RuleSeverity {
        match self {
            RuleType::HealthCheckTimeoutBelowInterval
            | RuleType::UnusedClusterCapacity
            | RuleType::MutableImageTag => RuleSeverity::Warning,
            RuleType::PublicIngress => RuleSeverity::Info,
            _ => RuleSeverity::Error,
        }
    }
}

impl StackRule {
    /// Create a rule of the given type with its standard name and severity.
    pub fn of(rule_type: RuleType) -> Self {
        let (name, description) = rule_type.describe();
        Self {
            id: rule_type.id().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            severity: rule_type.standard_severity(),
            rule_type,
            enabled: true,
        }
    }

    pub fn with_severity(mut self, severity: RuleSeverity) -> Self {
        self.severity = severity;
        self
    }

    fn violation(&self, field: impl Into<String>, message: impl Into<String>) -> RuleViolation {
        RuleViolation {
            rule_id: self.id.clone(),
            severity: self.severity,
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Override applied on top of a base rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleOverride {
    pub id: String,
    #[serde(default)]
    pub severity: Option<RuleSeverity>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Override file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleOverrides {
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub rules: Vec<RuleOverride>,
}

/// A set of stack rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    pub rules: Vec<StackRule>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// All rules at their standard severity.
    pub fn standard() -> Self {
        let mut rules = Self::new("Standard Rules");
        for rule_type in RuleType::all() {
            rules.add(StackRule::of(rule_type));
        }
        rules
    }

    /// Standard rules with every warning promoted to an error.
    pub fn strict() -> Self {
        let mut rules = Self::standard();
        rules.name = "Strict Rules".to_string();
        for rule in &mut rules.rules {
            if rule.severity == RuleSeverity::Warning {
                rule.severity = RuleSeverity::Error;
            }
        }
        rules
    }

    /// Load a rule set from a YAML override file.
    pub fn from_file(path: impl AsRef<Path>) -> PolicyResult<Self> {
        let path = path.as_ref();
        debug!("Loading rule overrides from {:?}", path);
        let content = fs::read_to_string(path)?;
        let overrides: RuleOverrides = serde_yaml::from_str(&content)?;

        let mut rules = if overrides.strict {
            Self::strict()
        } else {
            Self::standard()
        };
        rules.apply(&overrides.rules)?;
        Ok(rules)
    }

    /// Apply severity and enablement overrides by rule id.
    pub fn apply(&mut self, overrides: &[RuleOverride]) -> PolicyResult<()> {
        for o in overrides {
            let rule = self
                .rules
                .iter_mut()
                .find(|r| r.id == o.id)
                .ok_or_else(|| PolicyError::UnknownRule(o.id.clone()))?;
            if let Some(severity) = o.severity {
                rule.severity = severity;
            }
            if let Some(enabled) = o.enabled {
                rule.enabled = enabled;
            }
        }
        Ok(())
    }

    /// Add a rule to the set.
    pub fn add(&mut self, rule: StackRule) {
        self.rules.push(rule);
    }

    pub fn get(&self, id: &str) -> Option<&StackRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Evaluate rules against a configuration alone.
    ///
    /// Rules that need the image reference are skipped.
    pub fn evaluate(&self, config: &StackConfig) -> ValidationReport {
        self.evaluate_inner(config, None)
    }

    /// Evaluate rules against a configuration and the caller's props.
    pub fn evaluate_with_props(&self, config: &StackConfig, props: &StackProps) -> ValidationReport {
        self.evaluate_inner(config, Some(&props.image_tag))
    }

    fn evaluate_inner(&self, config: &StackConfig, tag: Option<&ImageTag>) -> ValidationReport {
        let mut report = ValidationReport::new();

        for rule in self.rules.iter().filter(|r| r.enabled) {
            let found = match rule.rule_type {
                RuleType::StackName => check_stack_name(rule, config),
                RuleType::IngressPortMatchesContainer => check_ingress_port(rule, config),
                RuleType::ContainerMemoryWithinTask => check_container_memory(rule, config),
                RuleType::HealthCheckTimeoutBelowInterval => check_timeout_below_interval(rule, config),
                RuleType::HealthCheckBounds => check_health_check_bounds(rule, config),
                RuleType::AvailabilityZonesBounded => check_availability_zones(rule, config),
                RuleType::ClusterCapacityBounds => check_capacity_bounds(rule, config),
                RuleType::UnusedClusterCapacity => check_unused_capacity(rule, config),
                RuleType::Ec2RequiresCapacity => check_ec2_capacity(rule, config),
                RuleType::FargateCpuMemory => check_fargate_sizing(rule, config),
                RuleType::MutableImageTag => match tag {
                    Some(tag) => check_image_tag(rule, tag),
                    None => Vec::new(),
                },
                RuleType::LogConfig => check_log_config(rule, config),
                RuleType::ContainerDefinition => check_container_definition(rule, config),
                RuleType::PublicIngress => check_public_ingress(rule, config),
            };

            for violation in found {
                debug!("Rule {} flagged {}: {}", rule.id, violation.field, violation.message);
                report.add(violation);
            }
        }

        report
    }
}

fn check_ingress_port(rule: &StackRule, config: &StackConfig) -> Vec<RuleViolation> {
    let mapping = &config.task_definition.container.port_mapping;
    let mut found = Vec::new();

    if let Some(port) = config.ingress.port {
        if port != mapping.container_port {
            found.push(rule.violation(
                "ingress.port",
                format!(
                    "container port mismatch between mapping and ingress rule ({} != {})",
                    mapping.container_port, port
                ),
            ));
        }
    }
    if config.ingress.protocol != mapping.protocol {
        found.push(rule.violation(
            "ingress.protocol",
            format!(
                "ingress protocol {} does not match container protocol {}",
                config.ingress.protocol, mapping.protocol
            ),
        ));
    }
    found
}

fn check_container_memory(rule: &StackRule, config: &StackConfig) -> Vec<RuleViolation> {
    let task = &config.task_definition;
    if task.container.memory_limit_mib > task.memory_limit_mib {
        return vec![rule.violation(
            "task_definition.container.memory_limit_mib",
            format!(
                "container memory {} MiB exceeds task memory {} MiB",
                task.container.memory_limit_mib, task.memory_limit_mib
            ),
        )];
    }
    Vec::new()
}

fn check_timeout_below_interval(rule: &StackRule, config: &StackConfig) -> Vec<RuleViolation> {
    let hc = &config.task_definition.container.health_check;
    if hc.timeout >= hc.interval {
        return vec![rule.violation(
            "task_definition.container.health_check.timeout_secs",
            format!(
                "health-check timeout ({}s) >= interval ({}s)",
                hc.timeout.as_secs(),
                hc.interval.as_secs()
            ),
        )];
    }
    Vec::new()
}

fn out_of_range(value: Duration, min: u64, max: u64) -> bool {
    let secs = value.as_secs();
    secs < min || secs > max || value.subsec_nanos() != 0
}

fn check_health_check_bounds(rule: &StackRule, config: &StackConfig) -> Vec<RuleViolation> {
    const FIELD: &str = "task_definition.container.health_check";
    let hc = &config.task_definition.container.health_check;
    let mut found = Vec::new();

    match hc.command.first().map(String::as_str) {
        None => found.push(rule.violation(format!("{}.command", FIELD), "command is empty")),
        Some("CMD") | Some("CMD-SHELL") if hc.command.len() < 2 => found.push(rule.violation(
            format!("{}.command", FIELD),
            "command has no arguments after its executor",
        )),
        Some("CMD") | Some("CMD-SHELL") | Some("NONE") => {}
        Some(other) => found.push(rule.violation(
            format!("{}.command", FIELD),
            format!("command must start with CMD, CMD-SHELL or NONE, found '{}'", other),
        )),
    }
    if out_of_range(hc.interval, 5, 300) {
        found.push(rule.violation(format!("{}.interval_secs", FIELD), "interval must be 5-300 seconds"));
    }
    if out_of_range(hc.timeout, 2, 120) {
        found.push(rule.violation(format!("{}.timeout_secs", FIELD), "timeout must be 2-120 seconds"));
    }
    if out_of_range(hc.start_period, 0, 300) {
        found.push(rule.violation(
            format!("{}.start_period_secs", FIELD),
            "start period must be 0-300 seconds",
        ));
    }
    if !(1..=10).contains(&hc.retries) {
        found.push(rule.violation(format!("{}.retries", FIELD), "retries must be 1-10"));
    }
    found
}

fn check_availability_zones(rule: &StackRule, config: &StackConfig) -> Vec<RuleViolation> {
    let azs = config.network.max_availability_zones;
    if azs == 0 || azs > MAX_AVAILABILITY_ZONES {
        return vec![rule.violation(
            "network.max_availability_zones",
            format!("{} is outside 1-{}", azs, MAX_AVAILABILITY_ZONES),
        )];
    }
    Vec::new()
}

fn check_stack_name(rule: &StackRule, config: &StackConfig) -> Vec<RuleViolation> {
    match validate_stack_name(&config.name) {
        Ok(()) => Vec::new(),
        Err(ModelError::InvalidValue { field, message }) => vec![rule.violation(field, message)],
        Err(e) => vec![rule.violation("name", e.to_string())],
    }
}

fn check_capacity_bounds(rule: &StackRule, config: &StackConfig) -> Vec<RuleViolation> {
    let Some(capacity) = &config.cluster.capacity else {
        return Vec::new();
    };
    let mut found = Vec::new();
    if capacity.max_capacity == 0 {
        found.push(rule.violation("cluster.capacity.max_capacity", "max capacity must be at least 1"));
    }
    if capacity.desired_capacity > capacity.max_capacity {
        found.push(rule.violation(
            "cluster.capacity.desired_capacity",
            format!(
                "desired capacity {} exceeds max capacity {}",
                capacity.desired_capacity, capacity.max_capacity
            ),
        ));
    }
    found
}

fn check_unused_capacity(rule: &StackRule, config: &StackConfig) -> Vec<RuleViolation> {
    match (&config.cluster.capacity, config.service.launch_type) {
        (Some(capacity), LaunchType::Fargate) => vec![rule.violation(
            "cluster.capacity",
            format!(
                "{} x {} instances are provisioned but the Fargate service never schedules on them",
                capacity.desired_capacity, capacity.instance_type
            ),
        )],
        _ => Vec::new(),
    }
}

fn check_ec2_capacity(rule: &StackRule, config: &StackConfig) -> Vec<RuleViolation> {
    if config.service.launch_type == LaunchType::Ec2 && config.cluster.capacity.is_none() {
        return vec![rule.violation("cluster.capacity", "EC2 service declared on a cluster without capacity")];
    }
    Vec::new()
}

/// Memory sizes (MiB) Fargate accepts for one CPU value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FargateMemory {
    OneOf(&'static [u32]),
    Range { min: u32, max: u32, step: u32 },
}

impl FargateMemory {
    fn for_cpu(cpu: u32) -> Option<Self> {
        let range = |min, max, step| Some(FargateMemory::Range { min, max, step });
        match cpu {
            256 => Some(FargateMemory::OneOf(&[512, 1024, 2048])),
            512 => range(1024, 4096, 1024),
            1024 => range(2048, 8192, 1024),
            2048 => range(4096, 16384, 1024),
            4096 => range(8192, 30720, 1024),
            8192 => range(16384, 61440, 4096),
            16384 => range(32768, 122880, 8192),
            _ => None,
        }
    }

    fn allows(&self, mem: u32) -> bool {
        match *self {
            FargateMemory::OneOf(sizes) => sizes.contains(&mem),
            FargateMemory::Range { min, max, step } => mem >= min && mem <= max && (mem - min) % step == 0,
        }
    }
}

impl fmt::Display for FargateMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FargateMemory::OneOf(sizes) => {
                let sizes: Vec<_> = sizes.iter().map(|s| s.to_string()).collect();
                write!(f, "one of {}", sizes.join(", "))
            }
            FargateMemory::Range { min, max, step } => write!(f, "{}-{} in steps of {}", min, max, step),
        }
    }
}

fn check_fargate_sizing(rule: &StackRule, config: &StackConfig) -> Vec<RuleViolation> {
    if config.service.launch_type != LaunchType::Fargate {
        return Vec::new();
    }
    let task = &config.task_definition;
    match FargateMemory::for_cpu(task.cpu) {
        None => vec![rule.violation(
            "task_definition.cpu",
            format!("{} is not a Fargate CPU value", task.cpu),
        )],
        Some(allowed) if !allowed.allows(task.memory_limit_mib) => vec![rule.violation(
            "task_definition.memory_limit_mib",
            format!(
                "{} MiB is not valid for {} CPU units (expected {})",
                task.memory_limit_mib, task.cpu, allowed
            ),
        )],
        Some(_) => Vec::new(),
    }
}

fn check_image_tag(rule: &StackRule, tag: &ImageTag) -> Vec<RuleViolation> {
    if tag.is_mutable() {
        return vec![rule.violation(
            "image_tag",
            format!("image is referenced by mutable tag '{}'", tag),
        )];
    }
    Vec::new()
}

fn stream_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^:*]{1,512}$").expect("stream prefix pattern is valid"))
}

fn check_log_config(rule: &StackRule, config: &StackConfig) -> Vec<RuleViolation> {
    let logging = &config.task_definition.container.logging;
    let mut found = Vec::new();
    if !stream_prefix_pattern().is_match(&logging.stream_prefix) {
        found.push(rule.violation(
            "task_definition.container.logging.stream_prefix",
            format!("'{}' is not a valid log stream prefix", logging.stream_prefix),
        ));
    }
    if logging.max_buffer_size_mib == 0 {
        found.push(rule.violation(
            "task_definition.container.logging.max_buffer_size_mib",
            "buffer size must be greater than zero",
        ));
    }
    found
}

fn check_container_definition(rule: &StackRule, config: &StackConfig) -> Vec<RuleViolation> {
    let container = &config.task_definition.container;
    let mut found = Vec::new();
    if container.name.trim().is_empty() {
        found.push(rule.violation("task_definition.container.name", "container name is empty"));
    }
    if container.port_mapping.container_port == 0 {
        found.push(rule.violation(
            "task_definition.container.port_mapping.container_port",
            "container port must be non-zero",
        ));
    }
    if container.memory_limit_mib == 0 {
        found.push(rule.violation(
            "task_definition.container.memory_limit_mib",
            "memory limit must be non-zero",
        ));
    }
    found
}

fn check_public_ingress(rule: &StackRule, config: &StackConfig) -> Vec<RuleViolation> {
    if config.ingress.source.is_any() {
        return vec![rule.violation(
            "ingress.source",
            format!(
                "{}/{} is open to {}",
                config.ingress_port(),
                config.ingress.protocol,
                config.ingress.source
            ),
        )];
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use apistack_model::{ClusterSpec, ImageRegistryRef, Protocol};

    #[test]
    fn test_default_config_passes_standard() {
        let report = RuleSet::standard().evaluate(&StackConfig::default());

        assert!(report.valid, "unexpected errors: {}", report);
        assert!(report.has_rule("health-check-timeout-below-interval"));
        assert!(report.has_rule("unused-cluster-capacity"));
        assert!(report.has_rule("public-ingress"));
        assert!(!report.has_rule("mutable-image-tag"));
    }

    #[test]
    fn test_default_config_fails_strict() {
        let props = StackProps::new(ImageRegistryRef::new("api").unwrap());
        let report = RuleSet::strict().evaluate_with_props(&StackConfig::default(), &props);

        assert!(!report.valid);
        let ids: Vec<_> = report.errors().map(|v| v.rule_id.as_str()).collect();
        assert!(ids.contains(&"health-check-timeout-below-interval"));
        assert!(ids.contains(&"unused-cluster-capacity"));
        assert!(ids.contains(&"mutable-image-tag"));
        // info stays info
        assert_eq!(report.infos().count(), 1);
    }

    #[test]
    fn test_ingress_port_mismatch() {
        let mut config = StackConfig::default();
        config.ingress.port = Some(8080);

        let report = RuleSet::standard().evaluate(&config);
        let error = report.errors().next().unwrap();
        assert_eq!(error.rule_id, "ingress-port-matches-container");
        assert_eq!(error.field, "ingress.port");
        assert!(error.message.contains("container port mismatch"));
    }

    #[test]
    fn test_ingress_protocol_mismatch() {
        let mut config = StackConfig::default();
        config.ingress.protocol = Protocol::Udp;

        let report = RuleSet::standard().evaluate(&config);
        assert!(!report.valid);
        assert!(report.errors().any(|v| v.field == "ingress.protocol"));
    }

    #[test]
    fn test_container_memory_exceeds_task() {
        let mut config = StackConfig::default();
        config.task_definition.container.memory_limit_mib = 1024;

        let report = RuleSet::standard().evaluate(&config);
        assert!(report.errors().any(|v| v.rule_id == "container-memory-within-task"));
    }

    #[test]
    fn test_health_check_bounds() {
        let mut config = StackConfig::default();
        let hc = &mut config.task_definition.container.health_check;
        hc.command = vec!["curl".to_string()];
        hc.retries = 0;
        hc.timeout = Duration::from_secs(1);

        let report = RuleSet::standard().evaluate(&config);
        let fields: Vec<_> = report
            .errors()
            .filter(|v| v.rule_id == "health-check-bounds")
            .map(|v| v.field.as_str())
            .collect();
        assert_eq!(fields.len(), 3);
        assert!(fields.iter().any(|f| f.ends_with("command")));
        assert!(fields.iter().any(|f| f.ends_with("retries")));
        assert!(fields.iter().any(|f| f.ends_with("timeout_secs")));
    }

    #[test]
    fn test_availability_zone_bounds() {
        let mut config = StackConfig::default();
        config.network.max_availability_zones = 0;
        assert!(!RuleSet::standard().evaluate(&config).valid);

        config.network.max_availability_zones = MAX_AVAILABILITY_ZONES + 1;
        assert!(!RuleSet::standard().evaluate(&config).valid);

        config.network.max_availability_zones = 3;
        assert!(RuleSet::standard().evaluate(&config).valid);
    }

    #[test]
    fn test_capacity_and_launch_type() {
        let mut config = StackConfig::default();
        config.cluster = ClusterSpec::serverless();
        let report = RuleSet::strict().evaluate(&config);
        assert!(!report.has_rule("unused-cluster-capacity"));

        config.service.launch_type = LaunchType::Ec2;
        let report = RuleSet::standard().evaluate(&config);
        assert!(report.errors().any(|v| v.rule_id == "ec2-requires-capacity"));

        let mut config = StackConfig::default();
        if let Some(capacity) = config.cluster.capacity.as_mut() {
            capacity.desired_capacity = 3;
        }
        let report = RuleSet::standard().evaluate(&config);
        assert!(report.errors().any(|v| v.field == "cluster.capacity.desired_capacity"));
    }

    #[test]
    fn test_fargate_sizing() {
        assert!(FargateMemory::for_cpu(300).is_none());
        let smallest = FargateMemory::for_cpu(256).unwrap();
        for mem in [512, 1024, 2048] {
            assert!(smallest.allows(mem));
        }
        assert!(!smallest.allows(1536));
        assert!(!smallest.allows(3072));

        let mut config = StackConfig::default();
        config.task_definition.memory_limit_mib = 1536;
        let report = RuleSet::standard().evaluate(&config);
        let error = report.errors().find(|v| v.rule_id == "fargate-cpu-memory").unwrap();
        assert_eq!(error.field, "task_definition.memory_limit_mib");
        assert!(error.message.contains("one of 512, 1024, 2048"));

        config.task_definition.memory_limit_mib = 2048;
        assert!(!RuleSet::standard().evaluate(&config).has_rule("fargate-cpu-memory"));

        let mut config = StackConfig::default();
        config.task_definition.memory_limit_mib = 4096;
        config.task_definition.container.memory_limit_mib = 4096;
        let report = RuleSet::standard().evaluate(&config);
        assert!(report.errors().any(|v| v.rule_id == "fargate-cpu-memory"));

        config.task_definition.cpu = 1024;
        assert!(RuleSet::standard().evaluate(&config).valid);

        config.task_definition.memory_limit_mib = 2500;
        assert!(!RuleSet::standard().evaluate(&config).valid);

        // EC2 tasks are not held to Fargate sizes
        config.service.launch_type = LaunchType::Ec2;
        config.task_definition.container.memory_limit_mib = 2048;
        assert!(!RuleSet::standard().evaluate(&config).has_rule("fargate-cpu-memory"));
    }

    #[test]
    fn test_stack_name() {
        assert!(!RuleSet::standard().evaluate(&StackConfig::default()).has_rule("stack-name"));

        for name in ["", "../escaped"] {
            let report = RuleSet::standard().evaluate(&StackConfig::named(name));
            assert!(!report.valid);
            let error = report.errors().next().unwrap();
            assert_eq!(error.rule_id, "stack-name");
            assert_eq!(error.field, "name");
        }
    }

    #[test]
    fn test_log_config() {
        let mut config = StackConfig::default();
        config.task_definition.container.logging.stream_prefix = "bad:prefix".to_string();
        config.task_definition.container.logging.max_buffer_size_mib = 0;

        let report = RuleSet::standard().evaluate(&config);
        assert_eq!(report.errors().filter(|v| v.rule_id == "log-config").count(), 2);
    }

    #[test]
    fn test_disabled_rule_is_skipped() {
        let mut rules = RuleSet::standard();
        rules
            .apply(&[RuleOverride {
                id: "public-ingress".to_string(),
                severity: None,
                enabled: Some(false),
            }])
            .unwrap();

        let report = rules.evaluate(&StackConfig::default());
        assert!(!report.has_rule("public-ingress"));
    }

    #[test]
    fn test_custom_rule_set() {
        let mut rules = RuleSet::new("Exposure Only");
        rules.add(StackRule::of(RuleType::PublicIngress).with_severity(RuleSeverity::Error));

        let report = rules.evaluate(&StackConfig::default());
        assert!(!report.valid);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].field, "ingress.source");
    }

    #[test]
    fn test_unknown_override() {
        let mut rules = RuleSet::standard();
        let result = rules.apply(&[RuleOverride {
            id: "does-not-exist".to_string(),
            severity: Some(RuleSeverity::Error),
            enabled: None,
        }]);
        assert!(matches!(result, Err(PolicyError::UnknownRule(_))));
    }
}
