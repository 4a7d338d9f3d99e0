//! # apistack_synth
//!
//! Turns a validated [`StackConfig`](apistack_model::StackConfig) into a
//! declarative resource graph for a provisioning engine to consume.
//!
//! The graph holds five nodes: `Vpc`, `Cluster`, `TaskDef`, the service
//! (`FargateService` or `Ec2Service`) and its ingress rule. Ids are explicit
//! map keys and each node lists the ids it depends on.
//!
//! ## Example
//!
//! ```rust
//! use apistack_model::{ImageRegistryRef, StackConfig, StackProps};
//! use apistack_synth::{ApiStack, ResourceKind};
//!
//! let props = StackProps::new(ImageRegistryRef::new("api").unwrap());
//! let synthesis = ApiStack::new(props, StackConfig::default()).synthesize().unwrap();
//!
//! assert_eq!(synthesis.graph.count(ResourceKind::Service), 1);
//! println!("{}", synthesis.graph.to_json().unwrap());
//! ```

pub mod builder;
pub mod diff;
pub mod emit;
pub mod error;
pub mod graph;
pub mod stack;

pub use builder::{ClusterHandle, NetworkHandle, ServiceHandle, StackBuilder, TaskDefinitionHandle};
pub use diff::{GraphDiff, NodeChange};
pub use emit::{Emitter, OutputFormat};
pub use error::{SynthError, SynthResult};
pub use graph::{
    CapacityResource, ClusterResource, ContainerResource, IngressRuleResource, LogicalId, NetworkResource,
    Resource, ResourceGraph, ResourceKind, ResourceNode, ServiceResource, TaskDefinitionResource,
};
pub use stack::{ids, ApiStack, Synthesis};
