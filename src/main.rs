//! # Datadog Agent Controller
//!
//! Watches `DatadogAgent` resources and converges the agent workloads they
//! describe.
//!
//! The watched version is selected with `WATCH_API_VERSION` (`v2alpha1` by
//! default). Owned DaemonSets, Deployments and Secrets are watched too, so
//! drift on a generated object triggers a pass on its owner.

use anyhow::{Context, Result};
use datadog_agent_controller::config::ControllerConfig;
use datadog_agent_controller::controller::client::KubeClusterClient;
use datadog_agent_controller::controller::error_policy::error_policy;
use datadog_agent_controller::controller::reconciler::Reconciler;
use datadog_agent_controller::controller::snapshot::AgentResource;
use datadog_agent_controller::crd::{v1alpha1, v2alpha1, ApiVersion};
use datadog_agent_controller::observability::metrics;
use datadog_agent_controller::server::{start_server, ServerState};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::Secret;
use kube::runtime::controller::{self, Controller};
use kube::runtime::watcher;
use kube::{Api, Client};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "datadog_agent_controller=info".into()),
        )
        .init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        build = env!("BUILD_GIT_HASH"),
        built_at = env!("BUILD_DATETIME"),
        "Starting Datadog Agent Controller"
    );

    let config = ControllerConfig::from_env();
    info!(
        watch_api_version = config.watch_api_version.as_str(),
        metrics_port = config.metrics_port,
        resync_interval_secs = config.resync_interval_secs,
        "Loaded configuration"
    );

    metrics::register_metrics().context("Failed to register metrics")?;

    let server_state = Arc::new(ServerState::default());
    let server_port = config.metrics_port;
    let server_state_clone = Arc::clone(&server_state);
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let server_version = client
        .apiserver_version()
        .await
        .context("Failed to reach the Kubernetes API server")?;
    info!(
        server_version = %server_version.git_version,
        "Connected to Kubernetes API server"
    );
    let cluster = Arc::new(KubeClusterClient::new(client.clone()));
    let watch_api_version = config.watch_api_version;
    let reconciler = Arc::new(Reconciler::new(cluster, config));

    server_state.is_ready.store(true, Ordering::Relaxed);

    match watch_api_version {
        ApiVersion::V1Alpha1 => run::<v1alpha1::DatadogAgent>(client, reconciler).await,
        ApiVersion::V2Alpha1 => run::<v2alpha1::DatadogAgent>(client, reconciler).await,
    }

    info!("Controller stopped");
    Ok(())
}

async fn run<K: AgentResource>(client: Client, reconciler: Arc<Reconciler>) {
    let concurrency = reconciler.config().max_concurrent_reconciliations;
    Controller::new(Api::<K>::all(client.clone()), watcher::Config::default())
        .owns(Api::<DaemonSet>::all(client.clone()), watcher::Config::default())
        .owns(Api::<Deployment>::all(client.clone()), watcher::Config::default())
        .owns(Api::<Secret>::all(client), watcher::Config::default())
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(Reconciler::reconcile::<K>, error_policy::<K>, reconciler)
        .for_each(|result| {
            if let Err(e) = result {
                warn!(error = %e, "Controller event not processed");
            }
            std::future::ready(())
        })
        .await;
}
