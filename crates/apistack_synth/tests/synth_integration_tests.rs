//! Integration tests for API stack synthesis.

use std::fs;
use std::time::Duration;

use tempfile::tempdir;

use apistack_model::{
    ClusterSpec, ImageRegistryRef, ImageTag, LaunchType, LogDriverMode, Protocol, StackConfig, StackProps,
};
use apistack_synth::{
    ApiStack, Emitter, GraphDiff, LogicalId, OutputFormat, Resource, ResourceGraph, ResourceKind, SynthError,
};

fn registry() -> ImageRegistryRef {
    ImageRegistryRef::new("api").unwrap()
}

fn synth(props: StackProps, config: StackConfig) -> ResourceGraph {
    ApiStack::new(props, config).synthesize().unwrap().graph
}

fn default_graph() -> ResourceGraph {
    synth(StackProps::new(registry()), StackConfig::default())
}

fn id(s: &str) -> LogicalId {
    LogicalId::new(s)
}

/// One node of each kind, wired in dependency order.
#[test]
fn test_graph_shape() {
    let graph = default_graph();

    for kind in ResourceKind::all() {
        assert_eq!(graph.count(kind), 1, "expected one {}", kind);
    }

    match &graph.get(&id("Cluster")).unwrap().resource {
        Resource::Cluster(cluster) => assert_eq!(cluster.network, id("Vpc")),
        other => panic!("unexpected resource: {:?}", other),
    }
    match &graph.get(&id("FargateService")).unwrap().resource {
        Resource::Service(service) => {
            assert_eq!(service.cluster, id("Cluster"));
            assert_eq!(service.task_definition, id("TaskDef"));
        }
        other => panic!("unexpected resource: {:?}", other),
    }

    let order: Vec<_> = graph
        .topological_order()
        .unwrap()
        .into_iter()
        .map(|i| i.as_str())
        .collect();
    assert_eq!(
        order,
        vec!["TaskDef", "Vpc", "Cluster", "FargateService", "FargateService/IngressAnyIpv4Port80"]
    );
}

/// The declared stack, literal by literal.
#[test]
fn test_default_scenario() {
    let graph = default_graph();

    let Resource::Network(network) = &graph.single(ResourceKind::Network).unwrap().resource else {
        panic!("network missing");
    };
    assert_eq!(network.max_availability_zones, 1);

    let Resource::Cluster(cluster) = &graph.single(ResourceKind::Cluster).unwrap().resource else {
        panic!("cluster missing");
    };
    let capacity = cluster.capacity.as_ref().unwrap();
    assert_eq!(capacity.instance_type, "t3.nano");
    assert_eq!((capacity.desired_capacity, capacity.max_capacity), (1, 1));

    let Resource::TaskDefinition(task) = &graph.single(ResourceKind::TaskDefinition).unwrap().resource else {
        panic!("task definition missing");
    };
    assert_eq!((task.cpu, task.memory_limit_mib), (256, 512));
    let container = &task.container;
    assert_eq!(container.name, "DefaultContainer");
    assert_eq!(container.image, "api:latest");
    assert_eq!(container.memory_limit_mib, 512);
    assert_eq!(container.logging.stream_prefix, "TestStreamPrefix");
    assert_eq!(container.logging.mode, LogDriverMode::NonBlocking);
    assert_eq!(container.logging.max_buffer_size_mib, 25);
    assert_eq!(container.port_mapping.container_port, 80);
    assert_eq!(container.port_mapping.protocol, Protocol::Tcp);
    assert_eq!(
        container.health_check.command,
        vec!["CMD-SHELL", "curl -f http://localhost/health || exit 1"]
    );
    assert_eq!(container.health_check.interval, Duration::from_secs(60));
    assert_eq!(container.health_check.retries, 3);
    assert_eq!(container.health_check.start_period, Duration::from_secs(60));
    assert_eq!(container.health_check.timeout, Duration::from_secs(60));

    let Resource::Service(service) = &graph.single(ResourceKind::Service).unwrap().resource else {
        panic!("service missing");
    };
    assert!(service.assign_public_ip);
    assert_eq!(service.launch_type, LaunchType::Fargate);

    let Resource::IngressRule(rule) = &graph.single(ResourceKind::IngressRule).unwrap().resource else {
        panic!("ingress rule missing");
    };
    assert_eq!(rule.port, 80);
    assert_eq!(rule.protocol, Protocol::Tcp);
    assert_eq!(rule.source.to_string(), "0.0.0.0/0");
}

/// The ingress rule follows the container port wherever it moves.
#[test]
fn test_ingress_tracks_container_port() {
    let mut config = StackConfig::default();
    config.task_definition.container.port_mapping.container_port = 8080;
    let graph = synth(StackProps::new(registry()), config);

    let Resource::IngressRule(rule) = &graph.single(ResourceKind::IngressRule).unwrap().resource else {
        panic!("ingress rule missing");
    };
    assert_eq!(rule.port, 8080);
    assert!(graph.get(&id("FargateService/IngressAnyIpv4Port8080")).is_some());
}

#[test]
fn test_port_mismatch_fails_before_emitting() {
    let mut config = StackConfig::default();
    config.ingress.port = Some(443);

    let err = ApiStack::new(StackProps::new(registry()), config)
        .synthesize()
        .unwrap_err();
    let SynthError::Validation(report) = err else {
        panic!("expected validation error");
    };
    assert!(report.errors().any(|v| v.field == "ingress.port"));
}

#[test]
fn test_container_memory_never_exceeds_task() {
    let mut config = StackConfig::default();
    config.task_definition.container.memory_limit_mib = 513;

    let result = ApiStack::new(StackProps::new(registry()), config).synthesize();
    assert!(matches!(result, Err(SynthError::Validation(_))));
}

/// Same inputs, same graph, same bytes.
#[test]
fn test_synthesis_is_deterministic() {
    let a = default_graph();
    let b = default_graph();

    assert_eq!(a, b);
    assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    assert_eq!(a.to_yaml().unwrap(), b.to_yaml().unwrap());
}

/// Changing the image tag touches the container image and nothing else.
#[test]
fn test_tag_change_only_changes_image() {
    let before = default_graph();
    let after = synth(
        StackProps::new(registry()).with_tag(ImageTag::tag("v2").unwrap()),
        StackConfig::default(),
    );

    let diff = GraphDiff::between(&before, &after).unwrap();
    assert!(diff.added.is_empty());
    assert!(diff.removed.is_empty());
    assert_eq!(diff.changed_ids(), vec![&id("TaskDef")]);
    assert_eq!(diff.changed[0].paths, vec!["/resource/container/image"]);
}

#[test]
fn test_serverless_cluster_diff() {
    let before = default_graph();
    let mut config = StackConfig::default();
    config.cluster = ClusterSpec::serverless();
    let after = synth(StackProps::new(registry()), config);

    let diff = GraphDiff::between(&before, &after).unwrap();
    assert_eq!(diff.changed_ids(), vec![&id("Cluster")]);
    assert_eq!(diff.changed[0].paths, vec!["/resource/capacity"]);
}

/// The network never silently spans more zones than configured.
#[test]
fn test_availability_zones_honored_exactly() {
    for azs in [1u8, 2, 3] {
        let mut config = StackConfig::default();
        config.network.max_availability_zones = azs;
        let graph = synth(StackProps::new(registry()), config);

        let Resource::Network(network) = &graph.single(ResourceKind::Network).unwrap().resource else {
            panic!("network missing");
        };
        assert_eq!(network.max_availability_zones, azs);
    }
}

#[test]
fn test_emitter_writes_graph() {
    let temp = tempdir().unwrap();
    let graph = default_graph();
    let emitter = Emitter::new(temp.path().join("out"));

    let json_path = emitter.write(&graph, OutputFormat::Json).unwrap();
    assert!(json_path.ends_with("ApiStack.graph.json"));
    let content = fs::read_to_string(&json_path).unwrap();
    let reloaded = ResourceGraph::from_json(&content).unwrap();
    assert_eq!(reloaded, graph);

    let yaml_path = emitter.write(&graph, OutputFormat::Yaml).unwrap();
    let content = fs::read_to_string(yaml_path).unwrap();
    assert!(content.contains("type: IngressRule"));
    assert!(content.contains("0.0.0.0/0"));
}

#[test]
fn test_stack_from_config_file() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("stack.yaml");
    fs::write(&path, "name: Staging\nservice:\n  assign_public_ip: false\n").unwrap();

    let stack = ApiStack::from_config_file(StackProps::new(registry()), &path).unwrap();
    let graph = stack.synthesize().unwrap().graph;

    assert_eq!(graph.stack_name, "Staging");
    let Resource::Service(service) = &graph.single(ResourceKind::Service).unwrap().resource else {
        panic!("service missing");
    };
    assert!(!service.assign_public_ip);
}

#[test]
fn test_stack_with_rules_file() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("rules.yaml");
    fs::write(&path, "strict: true\n").unwrap();

    let stack = ApiStack::new(StackProps::new(registry()), StackConfig::default())
        .with_rules_file(&path)
        .unwrap();
    assert!(!stack.validate().valid);
    assert!(matches!(stack.synthesize(), Err(SynthError::Validation(_))));
}

#[test]
fn test_stack_name_must_be_a_plain_identifier() {
    for name in ["", "../escaped"] {
        let result = ApiStack::new(StackProps::new(registry()), StackConfig::named(name)).synthesize();
        let Err(SynthError::Validation(report)) = result else {
            panic!("{:?} should fail validation", name);
        };
        assert!(report.has_rule("stack-name"));
    }
}

/// Turning the rule off does not let a bad name reach the filesystem.
#[test]
fn test_stack_name_checked_without_rule() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("rules.yaml");
    fs::write(&path, "rules:\n  - id: stack-name\n    enabled: false\n").unwrap();

    let stack = ApiStack::new(StackProps::new(registry()), StackConfig::named("../escaped"))
        .with_rules_file(&path)
        .unwrap();
    assert!(stack.validate().valid);
    assert!(matches!(stack.synthesize(), Err(SynthError::Model(_))));
}
