//! Resource specifications for the API stack.
//!
//! Every `Default` impl here reproduces the stack as it was first declared:
//! one availability zone, a T3/NANO capacity pool, a 256/512 task with one
//! container listening on TCP/80, and an ingress rule open to any IPv4 source.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ModelError;

/// Default health check probe.
pub const DEFAULT_HEALTH_CHECK: &str = "curl -f http://localhost/health || exit 1";

/// Default container port, shared by the port mapping and the ingress rule.
pub const DEFAULT_CONTAINER_PORT: u16 = 80;

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Virtual network specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSpec {
    /// Upper bound on availability zones the network may span.
    pub max_availability_zones: u8,
}

impl Default for NetworkSpec {
    fn default() -> Self {
        Self {
            max_availability_zones: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

/// Instance families available for cluster capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceClass {
    T3,
    T3a,
    T4g,
    M5,
    M6i,
    C5,
    C6i,
    R5,
}

impl InstanceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceClass::T3 => "t3",
            InstanceClass::T3a => "t3a",
            InstanceClass::T4g => "t4g",
            InstanceClass::M5 => "m5",
            InstanceClass::M6i => "m6i",
            InstanceClass::C5 => "c5",
            InstanceClass::C6i => "c6i",
            InstanceClass::R5 => "r5",
        }
    }
}

/// Instance sizes within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceSize {
    Nano,
    Micro,
    Small,
    Medium,
    Large,
    Xlarge,
    #[serde(rename = "2xlarge")]
    Xlarge2,
}

impl InstanceSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceSize::Nano => "nano",
            InstanceSize::Micro => "micro",
            InstanceSize::Small => "small",
            InstanceSize::Medium => "medium",
            InstanceSize::Large => "large",
            InstanceSize::Xlarge => "xlarge",
            InstanceSize::Xlarge2 => "2xlarge",
        }
    }
}

/// Instance class and size pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceType {
    pub class: InstanceClass,
    pub size: InstanceSize,
}

impl InstanceType {
    pub fn of(class: InstanceClass, size: InstanceSize) -> Self {
        Self { class, size }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class.as_str(), self.size.as_str())
    }
}

/// EC2 capacity attached to a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCapacity {
    pub instance_type: InstanceType,
    pub desired_capacity: u32,
    pub max_capacity: u32,
}

impl Default for ClusterCapacity {
    fn default() -> Self {
        Self {
            instance_type: InstanceType::of(InstanceClass::T3, InstanceSize::Nano),
            desired_capacity: 1,
            max_capacity: 1,
        }
    }
}

/// Cluster specification.
///
/// `capacity: None` declares a cluster with no EC2 capacity, which is all a
/// Fargate service needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSpec {
    pub capacity: Option<ClusterCapacity>,
}

impl Default for ClusterSpec {
    fn default() -> Self {
        Self {
            capacity: Some(ClusterCapacity::default()),
        }
    }
}

impl ClusterSpec {
    pub fn serverless() -> Self {
        Self { capacity: None }
    }
}

// ---------------------------------------------------------------------------
// Task definition
// ---------------------------------------------------------------------------

/// Transport protocol for port mappings and ingress rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Log delivery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogDriverMode {
    Blocking,
    #[default]
    NonBlocking,
}

/// Container log sink configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub stream_prefix: String,
    pub mode: LogDriverMode,
    pub max_buffer_size_mib: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            stream_prefix: "TestStreamPrefix".to_string(),
            mode: LogDriverMode::NonBlocking,
            max_buffer_size_mib: 25,
        }
    }
}

/// Container port mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortMapping {
    pub container_port: u16,
    pub protocol: Protocol,
}

impl Default for PortMapping {
    fn default() -> Self {
        Self {
            container_port: DEFAULT_CONTAINER_PORT,
            protocol: Protocol::Tcp,
        }
    }
}

/// Container health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheck {
    pub command: Vec<String>,
    #[serde(rename = "interval_secs", with = "duration_secs")]
    pub interval: Duration,
    pub retries: u32,
    #[serde(rename = "start_period_secs", with = "duration_secs")]
    pub start_period: Duration,
    #[serde(rename = "timeout_secs", with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            command: Self::shell_command(DEFAULT_HEALTH_CHECK),
            interval: Duration::from_secs(60),
            retries: 3,
            start_period: Duration::from_secs(60),
            timeout: Duration::from_secs(60),
        }
    }
}

impl HealthCheck {
    /// Wrap a shell snippet as a `CMD-SHELL` command.
    pub fn shell_command(script: impl Into<String>) -> Vec<String> {
        vec!["CMD-SHELL".to_string(), script.into()]
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The single container run by a task definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSpec {
    pub name: String,
    pub memory_limit_mib: u32,
    pub logging: LogConfig,
    pub port_mapping: PortMapping,
    pub health_check: HealthCheck,
}

impl Default for ContainerSpec {
    fn default() -> Self {
        Self {
            name: "DefaultContainer".to_string(),
            memory_limit_mib: 512,
            logging: LogConfig::default(),
            port_mapping: PortMapping::default(),
            health_check: HealthCheck::default(),
        }
    }
}

/// Task definition with exactly one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDefinitionSpec {
    pub cpu: u32,
    pub memory_limit_mib: u32,
    pub container: ContainerSpec,
}

impl Default for TaskDefinitionSpec {
    fn default() -> Self {
        Self {
            cpu: 256,
            memory_limit_mib: 512,
            container: ContainerSpec::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Service and ingress
// ---------------------------------------------------------------------------

/// How the service's tasks are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchType {
    #[default]
    Fargate,
    Ec2,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSpec {
    pub assign_public_ip: bool,
    pub launch_type: LaunchType,
    pub desired_count: u32,
}

impl Default for ServiceSpec {
    fn default() -> Self {
        Self {
            assign_public_ip: true,
            launch_type: LaunchType::Fargate,
            desired_count: 1,
        }
    }
}

/// IPv4 CIDR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    addr: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    pub const ANY: Ipv4Cidr = Ipv4Cidr {
        addr: Ipv4Addr::UNSPECIFIED,
        prefix: 0,
    };

    /// Build a block from its network address.
    ///
    /// Host bits past the prefix must be zero, so every block has exactly
    /// one spelling.
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, ModelError> {
        if prefix > 32 {
            return Err(ModelError::invalid(
                "ingress.source",
                format!("prefix length {} exceeds 32", prefix),
            ));
        }
        let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
        let network = Ipv4Addr::from(u32::from(addr) & mask);
        if network != addr {
            return Err(ModelError::invalid(
                "ingress.source",
                format!("{}/{} has host bits set; use {}/{}", addr, prefix, network, prefix),
            ));
        }
        Ok(Self { addr, prefix })
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn is_any(&self) -> bool {
        self.prefix == 0
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| ModelError::invalid("ingress.source", format!("'{}' is missing a prefix length", s)))?;
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| ModelError::invalid("ingress.source", format!("'{}' is not an IPv4 address", addr)))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| ModelError::invalid("ingress.source", format!("'{}' is not a prefix length", prefix)))?;
        Self::new(addr, prefix)
    }
}

impl Serialize for Ipv4Cidr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ipv4Cidr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Inbound rule on the service's security boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressSpec {
    /// Port to open. `None` follows the container's mapped port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub protocol: Protocol,
    pub source: Ipv4Cidr,
}

impl Default for IngressSpec {
    fn default() -> Self {
        Self {
            port: None,
            protocol: Protocol::Tcp,
            source: Ipv4Cidr::ANY,
        }
    }
}

impl IngressSpec {
    /// Port the rule opens, given the container's port mapping.
    pub fn effective_port(&self, mapping: &PortMapping) -> u16 {
        self.port.unwrap_or(mapping.container_port)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::ser::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        if value.subsec_nanos() != 0 {
            return Err(S::Error::custom(format!(
                "{:?} is not a whole number of seconds",
                value
            )));
        }
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
