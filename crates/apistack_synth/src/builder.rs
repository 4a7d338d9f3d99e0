//! Typed builder for resource graphs.
//!
//! Handles can only be obtained from the builder, so a service cannot be
//! declared before the cluster and task definition it runs on.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use apistack_model::{ClusterSpec, ImageRef, IngressSpec, LaunchType, NetworkSpec, ServiceSpec, TaskDefinitionSpec};

use crate::error::{SynthError, SynthResult};
use crate::graph::{
    CapacityResource, ClusterResource, ContainerResource, IngressRuleResource, LogicalId, NetworkResource,
    Resource, ResourceGraph, ResourceNode, ServiceResource, TaskDefinitionResource,
};

/// Handle to a declared network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkHandle(LogicalId);

/// Handle to a declared cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterHandle(LogicalId);

/// Handle to a declared task definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinitionHandle {
    id: LogicalId,
    container_port: u16,
}

/// Handle to a declared service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle(LogicalId);

macro_rules! handle_id {
    ($($handle:ty),*) => {
        $(impl $handle {
            pub fn id(&self) -> &LogicalId {
                &self.0
            }
        })*
    };
}

handle_id!(NetworkHandle, ClusterHandle, ServiceHandle);

impl TaskDefinitionHandle {
    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    pub fn container_port(&self) -> u16 {
        self.container_port
    }
}

/// Builder that assembles a [`ResourceGraph`] node by node.
pub struct StackBuilder {
    graph: ResourceGraph,
}

impl StackBuilder {
    pub fn new(stack_name: impl Into<String>) -> Self {
        Self {
            graph: ResourceGraph::new(stack_name),
        }
    }

    fn insert(&mut self, id: LogicalId, resource: Resource) -> SynthResult<LogicalId> {
        if self.graph.resources.contains_key(&id) {
            return Err(SynthError::DuplicateId(id));
        }
        let depends_on: BTreeSet<LogicalId> = resource.references().into_iter().cloned().collect();
        debug!("Declaring {} {} (depends on {:?})", resource.kind(), id, depends_on);

        self.graph.resources.insert(
            id.clone(),
            ResourceNode {
                id: id.clone(),
                resource,
                depends_on,
            },
        );
        Ok(id)
    }

    /// Declare a network.
    pub fn network(&mut self, id: &str, spec: &NetworkSpec) -> SynthResult<NetworkHandle> {
        let resource = Resource::Network(NetworkResource {
            max_availability_zones: spec.max_availability_zones,
        });
        self.insert(LogicalId::new(id), resource).map(NetworkHandle)
    }

    /// Declare a cluster attached to a network.
    pub fn cluster(&mut self, id: &str, network: &NetworkHandle, spec: &ClusterSpec) -> SynthResult<ClusterHandle> {
        let resource = Resource::Cluster(ClusterResource {
            network: network.id().clone(),
            capacity: spec.capacity.as_ref().map(CapacityResource::from),
        });
        self.insert(LogicalId::new(id), resource).map(ClusterHandle)
    }

    /// Declare a task definition running one container from `image`.
    pub fn task_definition(
        &mut self,
        id: &str,
        spec: &TaskDefinitionSpec,
        image: &ImageRef,
        compatibility: LaunchType,
    ) -> SynthResult<TaskDefinitionHandle> {
        let container = &spec.container;
        let resource = Resource::TaskDefinition(TaskDefinitionResource {
            compatibility,
            cpu: spec.cpu,
            memory_limit_mib: spec.memory_limit_mib,
            container: ContainerResource {
                name: container.name.clone(),
                image: image.uri(),
                memory_limit_mib: container.memory_limit_mib,
                logging: container.logging.clone(),
                port_mapping: container.port_mapping,
                health_check: container.health_check.clone(),
            },
        });
        let id = self.insert(LogicalId::new(id), resource)?;
        Ok(TaskDefinitionHandle {
            id,
            container_port: container.port_mapping.container_port,
        })
    }

    /// Declare a service running a task definition on a cluster.
    pub fn service(
        &mut self,
        id: &str,
        cluster: &ClusterHandle,
        task_definition: &TaskDefinitionHandle,
        spec: &ServiceSpec,
    ) -> SynthResult<ServiceHandle> {
        let resource = Resource::Service(ServiceResource {
            cluster: cluster.id().clone(),
            task_definition: task_definition.id().clone(),
            launch_type: spec.launch_type,
            desired_count: spec.desired_count,
            assign_public_ip: spec.assign_public_ip,
        });
        self.insert(LogicalId::new(id), resource).map(ServiceHandle)
    }

    /// Allow inbound traffic to a service on `port`.
    pub fn allow_ingress(&mut self, service: &ServiceHandle, port: u16, spec: &IngressSpec) -> SynthResult<LogicalId> {
        let name = if spec.source.is_any() {
            format!("IngressAnyIpv4Port{}", port)
        } else {
            format!("IngressPort{}", port)
        };
        let resource = Resource::IngressRule(IngressRuleResource {
            service: service.id().clone(),
            port,
            protocol: spec.protocol,
            source: spec.source,
        });
        self.insert(service.id().child(&name), resource)
    }

    pub fn build(self) -> ResourceGraph {
        self.graph
    }

    pub fn resources(&self) -> &BTreeMap<LogicalId, ResourceNode> {
        &self.graph.resources
    }
}
