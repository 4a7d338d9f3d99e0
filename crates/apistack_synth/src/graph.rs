//! Declarative resource graph.
//!
//! Nodes are keyed by an explicit [`LogicalId`]. References between nodes are
//! stored as ids, never as captured objects, and every reference is mirrored
//! in the node's `depends_on` set.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use apistack_model::{
    validate_stack_name, ClusterCapacity, HealthCheck, Ipv4Cidr, LaunchType, LogConfig, PortMapping, Protocol,
};

use crate::error::{SynthError, SynthResult};

/// Key of a node within a stack.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id of a node nested under this one, e.g. `FargateService/IngressAnyIpv4Port80`.
    pub fn child(&self, name: &str) -> Self {
        Self(format!("{}/{}", self.0, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kinds of resource a stack can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Network,
    Cluster,
    TaskDefinition,
    Service,
    IngressRule,
}

impl ResourceKind {
    pub fn all() -> [ResourceKind; 5] {
        [
            ResourceKind::Network,
            ResourceKind::Cluster,
            ResourceKind::TaskDefinition,
            ResourceKind::Service,
            ResourceKind::IngressRule,
        ]
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkResource {
    pub max_availability_zones: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterResource {
    pub network: LogicalId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<CapacityResource>,
}

/// Cluster capacity with the instance type rendered, e.g. `t3.nano`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityResource {
    pub instance_type: String,
    pub desired_capacity: u32,
    pub max_capacity: u32,
}

impl From<&ClusterCapacity> for CapacityResource {
    fn from(capacity: &ClusterCapacity) -> Self {
        Self {
            instance_type: capacity.instance_type.to_string(),
            desired_capacity: capacity.desired_capacity,
            max_capacity: capacity.max_capacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerResource {
    pub name: String,
    /// Fully rendered image URI.
    pub image: String,
    pub memory_limit_mib: u32,
    pub logging: LogConfig,
    pub port_mapping: PortMapping,
    pub health_check: HealthCheck,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinitionResource {
    pub compatibility: LaunchType,
    pub cpu: u32,
    pub memory_limit_mib: u32,
    pub container: ContainerResource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceResource {
    pub cluster: LogicalId,
    pub task_definition: LogicalId,
    pub launch_type: LaunchType,
    pub desired_count: u32,
    pub assign_public_ip: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRuleResource {
    pub service: LogicalId,
    pub port: u16,
    pub protocol: Protocol,
    pub source: Ipv4Cidr,
}

/// Properties of a declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Resource {
    Network(NetworkResource),
    Cluster(ClusterResource),
    TaskDefinition(TaskDefinitionResource),
    Service(ServiceResource),
    IngressRule(IngressRuleResource),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Network(_) => ResourceKind::Network,
            Resource::Cluster(_) => ResourceKind::Cluster,
            Resource::TaskDefinition(_) => ResourceKind::TaskDefinition,
            Resource::Service(_) => ResourceKind::Service,
            Resource::IngressRule(_) => ResourceKind::IngressRule,
        }
    }

    /// Ids this resource refers to in its properties.
    pub fn references(&self) -> Vec<&LogicalId> {
        match self {
            Resource::Network(_) | Resource::TaskDefinition(_) => Vec::new(),
            Resource::Cluster(c) => vec![&c.network],
            Resource::Service(s) => vec![&s.cluster, &s.task_definition],
            Resource::IngressRule(i) => vec![&i.service],
        }
    }
}

/// A node in the resource graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: LogicalId,
    pub resource: Resource,
    #[serde(default)]
    pub depends_on: BTreeSet<LogicalId>,
}

impl ResourceNode {
    pub fn kind(&self) -> ResourceKind {
        self.resource.kind()
    }
}

/// The declared resources of one stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGraph {
    pub stack_name: String,
    pub resources: BTreeMap<LogicalId, ResourceNode>,
}

impl ResourceGraph {
    pub fn new(stack_name: impl Into<String>) -> Self {
        Self {
            stack_name: stack_name.into(),
            resources: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, id: &LogicalId) -> Option<&ResourceNode> {
        self.resources.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.resources.values()
    }

    pub fn nodes_of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceNode> {
        self.resources.values().filter(move |n| n.kind() == kind)
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.nodes_of_kind(kind).count()
    }

    /// The only node of a kind, if exactly one exists.
    pub fn single(&self, kind: ResourceKind) -> Option<&ResourceNode> {
        let mut nodes = self.nodes_of_kind(kind);
        match (nodes.next(), nodes.next()) {
            (Some(node), None) => Some(node),
            _ => None,
        }
    }

    /// Ids the given node depends on.
    pub fn dependencies(&self, id: &LogicalId) -> Vec<&LogicalId> {
        self.resources
            .get(id)
            .map(|n| n.depends_on.iter().collect())
            .unwrap_or_default()
    }

    /// Ids of nodes that depend on the given node.
    pub fn dependents(&self, id: &LogicalId) -> Vec<&LogicalId> {
        self.resources
            .values()
            .filter(|n| n.depends_on.contains(id))
            .map(|n| &n.id)
            .collect()
    }

    /// Nodes in creation order; ties are broken by id.
    pub fn topological_order(&self) -> SynthResult<Vec<&LogicalId>> {
        let mut pending: BTreeMap<&LogicalId, usize> = BTreeMap::new();
        for node in self.resources.values() {
            for dep in &node.depends_on {
                if !self.resources.contains_key(dep) {
                    return Err(SynthError::DanglingReference {
                        from: node.id.clone(),
                        to: dep.clone(),
                    });
                }
            }
            pending.insert(&node.id, node.depends_on.len());
        }

        let mut ready: BTreeSet<&LogicalId> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.resources.len());

        while let Some(id) = ready.pop_first() {
            order.push(id);
            for dependent in self.dependents(id) {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() != self.resources.len() {
            let stuck: Vec<String> = pending
                .iter()
                .filter(|(_, count)| **count > 0)
                .map(|(id, _)| id.to_string())
                .collect();
            return Err(SynthError::Cycle(stuck.join(", ")));
        }
        Ok(order)
    }

    /// Verify the structural invariants of an API stack graph.
    pub fn check_invariants(&self) -> SynthResult<()> {
        validate_stack_name(&self.stack_name)?;

        for kind in ResourceKind::all() {
            let count = self.count(kind);
            if count != 1 {
                return Err(SynthError::InvariantViolated(format!(
                    "expected exactly one {} node, found {}",
                    kind, count
                )));
            }
        }

        for node in self.resources.values() {
            for reference in node.resource.references() {
                if !self.resources.contains_key(reference) {
                    return Err(SynthError::DanglingReference {
                        from: node.id.clone(),
                        to: reference.clone(),
                    });
                }
                if !node.depends_on.contains(reference) {
                    return Err(SynthError::InvariantViolated(format!(
                        "{} references {} without depending on it",
                        node.id, reference
                    )));
                }
            }
        }
        self.topological_order()?;

        if let Some(Resource::Cluster(cluster)) = self.single(ResourceKind::Cluster).map(|n| &n.resource) {
            self.expect_kind(&cluster.network, ResourceKind::Network)?;
        }

        let task = match self.single(ResourceKind::TaskDefinition).map(|n| &n.resource) {
            Some(Resource::TaskDefinition(task)) => task,
            _ => return Err(SynthError::InvariantViolated("task definition missing".to_string())),
        };
        if task.container.memory_limit_mib > task.memory_limit_mib {
            return Err(SynthError::InvariantViolated(format!(
                "container memory {} MiB exceeds task memory {} MiB",
                task.container.memory_limit_mib, task.memory_limit_mib
            )));
        }

        if let Some(Resource::Service(service)) = self.single(ResourceKind::Service).map(|n| &n.resource) {
            self.expect_kind(&service.cluster, ResourceKind::Cluster)?;
            self.expect_kind(&service.task_definition, ResourceKind::TaskDefinition)?;
        }

        if let Some(Resource::IngressRule(rule)) = self.single(ResourceKind::IngressRule).map(|n| &n.resource) {
            self.expect_kind(&rule.service, ResourceKind::Service)?;
            let mapping = &task.container.port_mapping;
            if rule.port != mapping.container_port || rule.protocol != mapping.protocol {
                return Err(SynthError::InvariantViolated(format!(
                    "ingress {}/{} does not match container mapping {}/{}",
                    rule.port, rule.protocol, mapping.container_port, mapping.protocol
                )));
            }
        }

        Ok(())
    }

    fn expect_kind(&self, id: &LogicalId, kind: ResourceKind) -> SynthResult<()> {
        match self.resources.get(id) {
            Some(node) if node.kind() == kind => Ok(()),
            Some(node) => Err(SynthError::InvariantViolated(format!(
                "{} should be a {} but is a {}",
                id,
                kind,
                node.kind()
            ))),
            None => Err(SynthError::InvariantViolated(format!("{} is missing", id))),
        }
    }

    pub fn to_json(&self) -> SynthResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> SynthResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_json(content: &str) -> SynthResult<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, resource: Resource, deps: &[&str]) -> ResourceNode {
        ResourceNode {
            id: LogicalId::new(id),
            resource,
            depends_on: deps.iter().map(|d| LogicalId::new(*d)).collect(),
        }
    }

    fn network() -> Resource {
        Resource::Network(NetworkResource {
            max_availability_zones: 1,
        })
    }

    #[test]
    fn test_logical_id_child() {
        let id = LogicalId::new("FargateService");
        assert_eq!(id.child("IngressAnyIpv4Port80").as_str(), "FargateService/IngressAnyIpv4Port80");
    }

    #[test]
    fn test_topological_order_breaks_ties_by_id() {
        let mut graph = ResourceGraph::new("Test");
        for n in [
            node("B", network(), &[]),
            node("A", network(), &[]),
            node("C", network(), &["B", "A"]),
        ] {
            graph.resources.insert(n.id.clone(), n);
        }

        let order: Vec<_> = graph.topological_order().unwrap().into_iter().map(|i| i.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
        assert_eq!(graph.dependents(&LogicalId::new("A")), vec![&LogicalId::new("C")]);
    }

    #[test]
    fn test_cycle_detected() {
        let mut graph = ResourceGraph::new("Test");
        for n in [node("A", network(), &["B"]), node("B", network(), &["A"])] {
            graph.resources.insert(n.id.clone(), n);
        }
        assert!(matches!(graph.topological_order(), Err(SynthError::Cycle(_))));
    }

    #[test]
    fn test_dangling_dependency() {
        let mut graph = ResourceGraph::new("Test");
        let n = node("A", network(), &["Missing"]);
        graph.resources.insert(n.id.clone(), n);
        assert!(matches!(
            graph.topological_order(),
            Err(SynthError::DanglingReference { .. })
        ));
    }

    #[test]
    fn test_invariants_reject_bad_stack_name() {
        let graph = ResourceGraph::new("../escaped");
        assert!(matches!(graph.check_invariants(), Err(SynthError::Model(_))));
    }

    #[test]
    fn test_invariants_require_every_kind() {
        let mut graph = ResourceGraph::new("Test");
        let n = node("Vpc", network(), &[]);
        graph.resources.insert(n.id.clone(), n);
        assert!(matches!(graph.check_invariants(), Err(SynthError::InvariantViolated(_))));
    }
}
