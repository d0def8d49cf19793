//! # DogStatsD Integration Tests
//!
//! Node agent DaemonSets produced for DogStatsD configurations, through a full
//! pass against the in-memory cluster, for both schema versions.

mod common;

use common::{node_agent_container, reconciler, v1_agent, v2_agent, FakeCluster, NAME};
use datadog_agent_controller::controller::reconciler::PassOutcome;
use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, Volume};
use serde_json::json;

const MAPPER_PROFILES_YAML: &str = "- name: 'profile_name'\n  prefix: 'profile_prefix'\n  mappings:\n    - match: 'metric_to_match'\n      name: 'mapped_metric_name'\n";
const MAPPER_PROFILES_JSON: &str = r#"[{"mappings":[{"match":"metric_to_match","name":"mapped_metric_name"}],"name":"profile_name","prefix":"profile_prefix"}]"#;

fn dogstatsd_env(container: &Container) -> Vec<(String, String)> {
    container
        .env
        .iter()
        .flatten()
        .filter(|e| e.name.starts_with("DD_DOGSTATSD_"))
        .map(|e| (e.name.clone(), e.value.clone().unwrap_or_default()))
        .collect()
}

fn pair(name: &str, value: &str) -> (String, String) {
    (name.to_string(), value.to_string())
}

fn udp_port(host_port: i32) -> ContainerPort {
    ContainerPort {
        name: Some("dogstatsdport".to_string()),
        container_port: 8125,
        host_port: Some(host_port),
        protocol: Some("UDP".to_string()),
        ..Default::default()
    }
}

fn pod_spec(cluster: &FakeCluster) -> PodSpec {
    cluster
        .daemonset(&format!("{NAME}-agent"))
        .and_then(|ds| ds.spec)
        .and_then(|spec| spec.template.spec)
        .unwrap()
}

fn socket_volume(pod: &PodSpec) -> Option<Volume> {
    pod.volumes
        .iter()
        .flatten()
        .find(|v| v.name == "dsdsocket")
        .cloned()
}

async fn run_v1(spec: serde_json::Value) -> std::sync::Arc<FakeCluster> {
    let cluster = FakeCluster::new();
    let report = reconciler(&cluster).run_pass(&v1_agent(spec)).await.unwrap();
    assert_eq!(report.outcome, PassOutcome::Converged);
    cluster
}

async fn run_v2(spec: serde_json::Value) -> std::sync::Arc<FakeCluster> {
    let cluster = FakeCluster::new();
    let report = reconciler(&cluster).run_pass(&v2_agent(spec)).await.unwrap();
    assert_eq!(report.outcome, PassOutcome::Converged);
    cluster
}

fn assert_udp_only(cluster: &FakeCluster, host_port: i32) {
    let agent = node_agent_container(cluster, "agent");
    assert_eq!(
        dogstatsd_env(&agent),
        vec![pair("DD_DOGSTATSD_NON_LOCAL_TRAFFIC", "true")]
    );
    assert_eq!(agent.ports.unwrap_or_default(), vec![udp_port(host_port)]);
    assert!(agent.volume_mounts.unwrap_or_default().is_empty());
    assert!(socket_volume(&pod_spec(cluster)).is_none());
}

fn assert_socket(cluster: &FakeCluster, path: &str) {
    let agent = node_agent_container(cluster, "agent");
    assert_eq!(
        dogstatsd_env(&agent),
        vec![
            pair("DD_DOGSTATSD_NON_LOCAL_TRAFFIC", "true"),
            pair("DD_DOGSTATSD_SOCKET", path),
        ]
    );
    let mounts = agent.volume_mounts.unwrap_or_default();
    assert_eq!(mounts.len(), 1);
    assert_eq!(mounts[0].name, "dsdsocket");
    assert_eq!(mounts[0].mount_path, path);
    assert_eq!(mounts[0].read_only, Some(true));

    let volume = socket_volume(&pod_spec(cluster)).unwrap();
    assert_eq!(volume.host_path.unwrap().path, path);
}

#[tokio::test]
async fn test_v1_defaults_to_udp_host_port() {
    let cluster = run_v1(json!({})).await;
    assert_udp_only(&cluster, 8125);
}

#[tokio::test]
async fn test_v1_custom_host_port() {
    let cluster = run_v1(json!({ "agent": { "config": { "hostPort": 1234 } } })).await;
    assert_udp_only(&cluster, 1234);
}

#[tokio::test]
async fn test_v1_socket_default_path() {
    let cluster = run_v1(json!({
        "agent": { "config": { "dogstatsd": { "unixDomainSocket": { "enabled": true } } } }
    }))
    .await;
    assert_socket(&cluster, "/var/run/datadog/dsd.socket");
    assert_ne!(pod_spec(&cluster).host_pid, Some(true));
}

#[tokio::test]
async fn test_v1_socket_custom_host_filepath() {
    let cluster = run_v1(json!({
        "agent": { "config": { "dogstatsd": { "unixDomainSocket": {
            "enabled": true,
            "hostFilepath": "/var/run/statsd/dsd.sock"
        } } } }
    }))
    .await;
    assert_socket(&cluster, "/var/run/statsd/dsd.sock");
}

#[tokio::test]
async fn test_v1_mapper_profiles() {
    let cluster = run_v1(json!({
        "agent": { "config": { "dogstatsd": {
            "mapperProfiles": { "configData": MAPPER_PROFILES_YAML }
        } } }
    }))
    .await;
    let agent = node_agent_container(&cluster, "agent");
    assert_eq!(
        dogstatsd_env(&agent),
        vec![
            pair("DD_DOGSTATSD_NON_LOCAL_TRAFFIC", "true"),
            pair("DD_DOGSTATSD_MAPPER_PROFILES", MAPPER_PROFILES_JSON),
        ]
    );
}

#[tokio::test]
async fn test_v1_origin_detection_with_socket() {
    let cluster = run_v1(json!({
        "agent": { "config": { "dogstatsd": {
            "dogstatsdOriginDetection": true,
            "unixDomainSocket": { "enabled": true }
        } } }
    }))
    .await;
    let agent = node_agent_container(&cluster, "agent");
    assert_eq!(
        dogstatsd_env(&agent),
        vec![
            pair("DD_DOGSTATSD_NON_LOCAL_TRAFFIC", "true"),
            pair("DD_DOGSTATSD_SOCKET", "/var/run/datadog/dsd.socket"),
            pair("DD_DOGSTATSD_ORIGIN_DETECTION", "true"),
        ]
    );
    assert_eq!(pod_spec(&cluster).host_pid, Some(true));
}

#[tokio::test]
async fn test_v2_udp_host_port() {
    let cluster = run_v2(json!({
        "features": { "dogstatsd": {
            "hostPortConfig": { "enabled": true },
            "unixDomainSocketConfig": { "enabled": false }
        } }
    }))
    .await;
    assert_udp_only(&cluster, 8125);
}

#[tokio::test]
async fn test_v2_custom_host_port() {
    let cluster = run_v2(json!({
        "features": { "dogstatsd": { "hostPortConfig": { "enabled": true, "port": 1234 } } }
    }))
    .await;
    assert_udp_only(&cluster, 1234);
}

#[tokio::test]
async fn test_v2_host_port_disabled() {
    let cluster = run_v2(json!({
        "features": { "dogstatsd": { "hostPortConfig": { "enabled": false, "port": 1234 } } }
    }))
    .await;
    let agent = node_agent_container(&cluster, "agent");
    assert!(dogstatsd_env(&agent).is_empty());
    assert!(agent.ports.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_v2_socket_default_path() {
    let cluster = run_v2(json!({
        "features": { "dogstatsd": {
            "hostPortConfig": { "enabled": true },
            "unixDomainSocketConfig": { "enabled": true }
        } }
    }))
    .await;
    assert_socket(&cluster, "/var/run/datadog/dsd.socket");
}

#[tokio::test]
async fn test_v2_socket_custom_path() {
    let cluster = run_v2(json!({
        "features": { "dogstatsd": {
            "hostPortConfig": { "enabled": true },
            "unixDomainSocketConfig": { "enabled": true, "path": "/var/run/statsd/dsd.sock" }
        } }
    }))
    .await;
    assert_socket(&cluster, "/var/run/statsd/dsd.sock");
}

#[tokio::test]
async fn test_v2_mapper_profiles() {
    let cluster = run_v2(json!({
        "features": { "dogstatsd": {
            "hostPortConfig": { "enabled": true },
            "mapperProfiles": { "configData": MAPPER_PROFILES_YAML }
        } }
    }))
    .await;
    let agent = node_agent_container(&cluster, "agent");
    assert_eq!(
        dogstatsd_env(&agent),
        vec![
            pair("DD_DOGSTATSD_NON_LOCAL_TRAFFIC", "true"),
            pair("DD_DOGSTATSD_MAPPER_PROFILES", MAPPER_PROFILES_JSON),
        ]
    );
}

#[tokio::test]
async fn test_v2_origin_detection_with_socket() {
    let cluster = run_v2(json!({
        "features": { "dogstatsd": {
            "originDetectionEnabled": true,
            "hostPortConfig": { "enabled": true },
            "unixDomainSocketConfig": { "enabled": true }
        } }
    }))
    .await;
    let agent = node_agent_container(&cluster, "agent");
    assert_eq!(
        dogstatsd_env(&agent),
        vec![
            pair("DD_DOGSTATSD_NON_LOCAL_TRAFFIC", "true"),
            pair("DD_DOGSTATSD_SOCKET", "/var/run/datadog/dsd.socket"),
            pair("DD_DOGSTATSD_ORIGIN_DETECTION", "true"),
        ]
    );
    assert_eq!(pod_spec(&cluster).host_pid, Some(true));
}

#[tokio::test]
async fn test_v2_origin_detection_without_socket_keeps_host_pid_unset() {
    let cluster = run_v2(json!({
        "features": { "dogstatsd": {
            "originDetectionEnabled": true,
            "hostPortConfig": { "enabled": true }
        } }
    }))
    .await;
    assert_ne!(pod_spec(&cluster).host_pid, Some(true));
}
