//! # apistack_model
//!
//! Typed configuration for the API stack: a network, a cluster, a single
//! container task definition, a service and its ingress rule.
//!
//! The model holds no behavior beyond defaults and file loading. Validation
//! lives in `apistack_policy` and graph assembly in `apistack_synth`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use apistack_model::{ImageRegistryRef, StackConfig, StackProps};
//!
//! let registry = ImageRegistryRef::new("api").unwrap();
//! let props = StackProps::new(registry);
//! let config = StackConfig::from_file("stack.yaml").unwrap();
//!
//! assert_eq!(props.image().uri(), "api:latest");
//! println!("ingress port: {}", config.ingress_port());
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod registry;

pub use config::{validate_stack_name, StackConfig, DEFAULT_STACK_NAME};
pub use error::{ModelError, ModelResult};
pub use models::{
    ClusterCapacity, ClusterSpec, ContainerSpec, HealthCheck, IngressSpec, InstanceClass, InstanceSize,
    InstanceType, Ipv4Cidr, LaunchType, LogConfig, LogDriverMode, NetworkSpec, PortMapping, Protocol,
    ServiceSpec, TaskDefinitionSpec, DEFAULT_CONTAINER_PORT, DEFAULT_HEALTH_CHECK,
};
pub use registry::{ImageRef, ImageRegistryRef, ImageTag, StackProps, DEFAULT_IMAGE_TAG};
