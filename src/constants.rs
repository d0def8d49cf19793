//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable. Names of
//! environment variables, ports and mount paths consumed by the agent
//! runtime are a wire contract and must not change.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default requeue interval after a successful pass (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;

/// Default Fibonacci backoff minimum (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default Fibonacci backoff maximum (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// API version watched when `WATCH_API_VERSION` is not set
pub const DEFAULT_WATCH_API_VERSION: &str = "v2alpha1";

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "datadog-agent-controller";

// Default images

pub const DEFAULT_REGISTRY: &str = "gcr.io/datadoghq";
pub const DEFAULT_AGENT_IMAGE_NAME: &str = "agent";
pub const DEFAULT_AGENT_IMAGE_TAG: &str = "7.40.1";
pub const DEFAULT_CLUSTER_AGENT_IMAGE_NAME: &str = "cluster-agent";
pub const DEFAULT_CLUSTER_AGENT_IMAGE_TAG: &str = "1.24.0";

// Object metadata

pub const LABEL_NAME: &str = "app.kubernetes.io/name";
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
pub const LABEL_COMPONENT: &str = "app.kubernetes.io/component";
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "datadog-agent-controller";

/// Annotation carrying the hash of the controller-owned content of an object
pub const SPEC_HASH_ANNOTATION: &str = "agent.datadoghq.com/spec-hash";

// Credentials secret keys

pub const API_KEY_KEY: &str = "api_key";
pub const APP_KEY_KEY: &str = "app_key";
pub const TOKEN_KEY: &str = "token";

// Container names

pub const CORE_AGENT_CONTAINER: &str = "agent";
pub const TRACE_AGENT_CONTAINER: &str = "trace-agent";
pub const PROCESS_AGENT_CONTAINER: &str = "process-agent";
pub const SYSTEM_PROBE_CONTAINER: &str = "system-probe";
pub const SECURITY_AGENT_CONTAINER: &str = "security-agent";
pub const CLUSTER_AGENT_CONTAINER: &str = "cluster-agent";
pub const CLUSTER_CHECKS_RUNNER_CONTAINER: &str = "agent";

// Global environment variables

pub const DD_API_KEY: &str = "DD_API_KEY";
pub const DD_APP_KEY: &str = "DD_APP_KEY";
pub const DD_CLUSTER_AGENT_AUTH_TOKEN: &str = "DD_CLUSTER_AGENT_AUTH_TOKEN";
pub const DD_SITE: &str = "DD_SITE";
pub const DD_CLUSTER_NAME: &str = "DD_CLUSTER_NAME";
pub const DD_LOG_LEVEL: &str = "DD_LOG_LEVEL";
pub const DD_TAGS: &str = "DD_TAGS";

// Dogstatsd

pub const DD_DOGSTATSD_NON_LOCAL_TRAFFIC: &str = "DD_DOGSTATSD_NON_LOCAL_TRAFFIC";
pub const DD_DOGSTATSD_SOCKET: &str = "DD_DOGSTATSD_SOCKET";
pub const DD_DOGSTATSD_ORIGIN_DETECTION: &str = "DD_DOGSTATSD_ORIGIN_DETECTION";
pub const DD_DOGSTATSD_MAPPER_PROFILES: &str = "DD_DOGSTATSD_MAPPER_PROFILES";
pub const DOGSTATSD_PORT_NAME: &str = "dogstatsdport";
pub const DEFAULT_DOGSTATSD_PORT: i32 = 8125;
pub const DOGSTATSD_SOCKET_VOLUME_NAME: &str = "dsdsocket";
pub const DEFAULT_DOGSTATSD_SOCKET_PATH: &str = "/var/run/datadog/dsd.socket";

// APM

pub const DD_APM_ENABLED: &str = "DD_APM_ENABLED";
pub const DD_APM_NON_LOCAL_TRAFFIC: &str = "DD_APM_NON_LOCAL_TRAFFIC";
pub const DD_APM_RECEIVER_SOCKET: &str = "DD_APM_RECEIVER_SOCKET";
pub const APM_PORT_NAME: &str = "traceport";
pub const DEFAULT_APM_PORT: i32 = 8126;
pub const APM_SOCKET_VOLUME_NAME: &str = "apmsocket";
pub const DEFAULT_APM_SOCKET_PATH: &str = "/var/run/datadog/apm.socket";

// Log collection

pub const DD_LOGS_ENABLED: &str = "DD_LOGS_ENABLED";
pub const DD_LOGS_CONFIG_CONTAINER_COLLECT_ALL: &str = "DD_LOGS_CONFIG_CONTAINER_COLLECT_ALL";
pub const DD_LOGS_CONFIG_K8S_CONTAINER_USE_FILE: &str = "DD_LOGS_CONFIG_K8S_CONTAINER_USE_FILE";
pub const DD_LOGS_CONFIG_OPEN_FILES_LIMIT: &str = "DD_LOGS_CONFIG_OPEN_FILES_LIMIT";
pub const POINTER_VOLUME_NAME: &str = "pointerdir";
pub const DEFAULT_POINTER_PATH: &str = "/var/lib/datadog-agent/logs";
pub const POD_LOG_VOLUME_NAME: &str = "logpodpath";
pub const POD_LOG_PATH: &str = "/var/log/pods";
pub const CONTAINER_LOG_VOLUME_NAME: &str = "logcontainerpath";
pub const DEFAULT_CONTAINER_LOG_PATH: &str = "/var/lib/docker/containers";
pub const SYMLINK_CONTAINER_VOLUME_NAME: &str = "symlinkcontainerpath";
pub const SYMLINK_CONTAINER_PATH: &str = "/var/log/containers";
pub const POINTER_MOUNT_PATH: &str = "/opt/datadog-agent/run";

// Network performance monitoring

pub const DD_SYSTEM_PROBE_ENABLED: &str = "DD_SYSTEM_PROBE_ENABLED";
pub const DD_SYSTEM_PROBE_NETWORK_ENABLED: &str = "DD_SYSTEM_PROBE_NETWORK_ENABLED";
pub const DD_SYSPROBE_SOCKET: &str = "DD_SYSPROBE_SOCKET";
pub const DEBUGFS_VOLUME_NAME: &str = "debugfs";
pub const DEBUGFS_PATH: &str = "/sys/kernel/debug";
pub const SYSPROBE_SOCKET_VOLUME_NAME: &str = "sysprobe-socket-dir";
pub const SYSPROBE_SOCKET_DIR: &str = "/var/run/sysprobe";
pub const SYSPROBE_SOCKET_PATH: &str = "/var/run/sysprobe/sysprobe.sock";
pub const PROC_VOLUME_NAME: &str = "procdir";
pub const PROC_HOST_PATH: &str = "/proc";
pub const PROC_MOUNT_PATH: &str = "/host/proc";

// Compliance (CSPM)

pub const DD_COMPLIANCE_CONFIG_ENABLED: &str = "DD_COMPLIANCE_CONFIG_ENABLED";
pub const DD_COMPLIANCE_CONFIG_CHECK_INTERVAL: &str = "DD_COMPLIANCE_CONFIG_CHECK_INTERVAL";
pub const COMPLIANCE_CONFIG_VOLUME_NAME: &str = "complianceconfigdir";
pub const COMPLIANCE_CONFIG_PATH: &str = "/etc/datadog-agent/compliance.d";
pub const HOST_ROOT_VOLUME_NAME: &str = "hostroot";
pub const HOST_ROOT_MOUNT_PATH: &str = "/host/root";
pub const CGROUPS_VOLUME_NAME: &str = "cgroups";
pub const CGROUPS_HOST_PATH: &str = "/sys/fs/cgroup";
pub const CGROUPS_MOUNT_PATH: &str = "/host/sys/fs/cgroup";

// Cluster checks

pub const DD_CLUSTER_CHECKS_ENABLED: &str = "DD_CLUSTER_CHECKS_ENABLED";
pub const DD_EXTRA_CONFIG_PROVIDERS: &str = "DD_EXTRA_CONFIG_PROVIDERS";
pub const DD_EXTRA_LISTENERS: &str = "DD_EXTRA_LISTENERS";
pub const CLUSTER_AGENT_CONFIG_PROVIDERS: &str = "kube_endpoints kube_services";
pub const CLUSTER_AGENT_LISTENERS: &str = "kube_endpoints kube_services";
pub const NODE_AGENT_CLUSTER_CHECKS_CONFIG_PROVIDERS: &str = "clusterchecks endpointschecks";
pub const NODE_AGENT_ENDPOINT_CHECKS_CONFIG_PROVIDERS: &str = "endpointschecks";
pub const CLUSTER_CHECKS_RUNNER_CONFIG_PROVIDERS: &str = "clusterchecks";
