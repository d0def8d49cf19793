//! # Reconciler
//!
//! One pass over a `DatadogAgent`:
//!
//! 1. Normalize the spec (legacy objects are translated) and record `ConfigurationValid`
//! 2. Build the enabled features once for the pass
//! 3. Put the cluster agent token into the pass status when needed, adopting
//!    the one already stored in the live Secret before generating a new one
//! 4. Converge the credentials Secret and record `CredentialsSecretReconcile`
//! 5. For each enabled component: default draft, features, global settings,
//!    component override, then convergence of the resulting workload
//! 6. Patch the status subresource once, and only when it changed
//!
//! Components are independent: one failing does not stop the others. When the
//! credentials Secret cannot be converged the components are not attempted.
//!
//! Transient failures surface as [`ReconcilerError::Transient`] so the error
//! policy requeues the whole pass with backoff. Terminal failures are recorded on
//! the status and wait for the resource to change.

use crate::component::{ComponentDraft, ComponentName, DesiredWorkload};
use crate::config::ControllerConfig;
use crate::controller::client::{ClusterClient, ObjectClient};
use crate::controller::convergence::{converge, Operation};
use crate::controller::error_policy::{backoff_key, BackoffState};
use crate::controller::secret::{
    adopt_live_token, credential_refs, desired_secret, ensure_cluster_agent_token,
    needs_generated_token, CredentialRefs,
};
use crate::controller::snapshot::{AgentMeta, AgentResource};
use crate::crd::v2alpha1::DatadogAgentSpec;
use crate::crd::{update_condition, ConditionStatus, ConditionType, DatadogAgentStatus};
use crate::error::{ClientError, ComponentError, ConvergenceError};
use crate::feature::{apply_features, build_features, required_containers, Feature, FeatureFactory};
use crate::observability::metrics;
use crate::overrides::{apply_global, apply_override};
use k8s_openapi::api::core::v1::Secret;
use kube::runtime::controller::Action;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("DatadogAgent has no namespace")]
    MissingObjectKey,

    #[error("failed to patch status: {0}")]
    Status(#[source] ClientError),

    #[error("transient failure, retrying: {0}")]
    Transient(String),
}

/// How a pass ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Every enabled component converged
    Converged,
    /// At least one failure that retrying will not fix
    Terminal,
    /// At least one failure that should clear up on retry
    Transient(String),
}

/// Result of one pass, before it is turned into a requeue decision
#[derive(Debug, Clone)]
pub struct PassReport {
    pub status: DatadogAgentStatus,
    pub status_patched: bool,
    pub outcome: PassOutcome,
    /// Outcome of every component attempted in the pass
    pub components: BTreeMap<ComponentName, Result<Operation, ComponentError>>,
}

pub struct Reconciler {
    client: Arc<dyn ClusterClient>,
    config: ControllerConfig,
    feature_factory: FeatureFactory,
    // Keyed by namespace/name
    pub(crate) backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Outcomes accumulated across a pass
#[derive(Default)]
struct Tally {
    transient: Vec<String>,
    terminal: bool,
}

impl Tally {
    fn record(&mut self, error: &ComponentError) {
        if error.is_transient() {
            self.transient.push(error.to_string());
        } else {
            self.terminal = true;
        }
    }

    fn outcome(self) -> PassOutcome {
        if !self.transient.is_empty() {
            PassOutcome::Transient(self.transient.join("; "))
        } else if self.terminal {
            PassOutcome::Terminal
        } else {
            PassOutcome::Converged
        }
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(client: Arc<dyn ClusterClient>, config: ControllerConfig) -> Self {
        Self {
            client,
            config,
            feature_factory: build_features,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Replace the function building the features of a pass
    #[must_use]
    pub fn with_feature_factory(mut self, feature_factory: FeatureFactory) -> Self {
        self.feature_factory = feature_factory;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Entry point for the kube-runtime controller
    #[allow(
        clippy::missing_errors_doc,
        reason = "Errors are handed to the error policy"
    )]
    pub async fn reconcile<K: AgentResource>(
        agent: Arc<K>,
        ctx: Arc<Reconciler>,
    ) -> Result<Action, ReconcilerError> {
        let report = ctx.run_pass(agent.as_ref()).await?;
        let action = match report.outcome {
            PassOutcome::Converged => Action::requeue(ctx.config.resync_interval()),
            PassOutcome::Terminal => Action::await_change(),
            PassOutcome::Transient(message) => return Err(ReconcilerError::Transient(message)),
        };
        // Only failing resources keep a backoff entry
        if let Some(meta) = agent.agent_meta() {
            ctx.clear_backoff(&meta);
        }
        Ok(action)
    }

    /// Run one pass over `agent` and persist its status
    #[allow(
        clippy::missing_errors_doc,
        reason = "Only a missing namespace or a failed status patch abort the pass"
    )]
    pub async fn run_pass<K: AgentResource>(&self, agent: &K) -> Result<PassReport, ReconcilerError> {
        let meta = agent.agent_meta().ok_or(ReconcilerError::MissingObjectKey)?;
        let span = info_span!(
            "reconcile",
            resource.name = %meta.name,
            resource.namespace = %meta.namespace,
            api_version = meta.api_version.as_str(),
        );

        async move {
            let start = Instant::now();
            metrics::increment_reconciliations();

            let previous = agent.status().cloned().unwrap_or_default();
            let mut status = previous.clone();
            let now = chrono::Utc::now().to_rfc3339();

            let (outcome, components) = match agent.normalized_spec() {
                Ok(spec) => {
                    update_condition(
                        &mut status,
                        &now,
                        ConditionType::ConfigurationValid,
                        ConditionStatus::True,
                        "Valid",
                        "",
                        false,
                    );
                    self.converge_all(&meta, &spec, &mut status, &now).await
                }
                Err(e) => {
                    warn!(error = %e, "Configuration cannot be translated");
                    metrics::increment_reconciliation_errors("ConfigTranslationError");
                    update_condition(
                        &mut status,
                        &now,
                        ConditionType::ConfigurationValid,
                        ConditionStatus::False,
                        "ConfigTranslationError",
                        &e.to_string(),
                        true,
                    );
                    (PassOutcome::Terminal, BTreeMap::new())
                }
            };

            status.observed_generation = meta.generation;
            let status_patched = status != previous;
            if status_patched {
                self.client
                    .patch_status(meta.api_version, &meta.namespace, &meta.name, &status)
                    .await
                    .map_err(ReconcilerError::Status)?;
                metrics::increment_status_patches();
                debug!("Patched status");
            }

            metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
            match &outcome {
                PassOutcome::Converged => info!("Reconciliation complete"),
                PassOutcome::Terminal => warn!("Reconciliation finished with terminal errors"),
                PassOutcome::Transient(message) => {
                    warn!(error = %message, "Reconciliation finished with transient errors");
                }
            }

            Ok(PassReport {
                status,
                status_patched,
                outcome,
                components,
            })
        }
        .instrument(span)
        .await
    }

    async fn converge_all(
        &self,
        meta: &AgentMeta,
        spec: &DatadogAgentSpec,
        status: &mut DatadogAgentStatus,
        now: &str,
    ) -> (PassOutcome, BTreeMap<ComponentName, Result<Operation, ComponentError>>) {
        let features = (self.feature_factory)(spec);
        debug!(
            features = ?features.iter().map(|f| f.id().as_str()).collect::<Vec<_>>(),
            "Enabled features"
        );

        let mut tally = Tally::default();
        let mut components = BTreeMap::new();
        let enabled: Vec<ComponentName> = ComponentName::ALL
            .into_iter()
            .filter(|c| spec.component_enabled(*c))
            .collect();

        let secret = match self.settle_cluster_agent_token(meta, spec, status).await {
            Ok(()) => desired_secret(meta, spec, status, &self.config),
            Err(e) => {
                warn!(error = %e, "Live credentials Secret not readable");
                update_condition(
                    status,
                    now,
                    ConditionType::CredentialsSecretReconcile,
                    ConditionStatus::False,
                    "ConvergenceError",
                    &e.to_string(),
                    true,
                );
                metrics::increment_reconciliation_errors("ConvergenceError");
                tally.record(&ComponentError::from(e));
                block_components(status, now, &enabled, &mut components);
                return (tally.outcome(), components);
            }
        };
        let secret_ok = match secret.clone() {
            None => {
                update_condition(
                    status,
                    now,
                    ConditionType::CredentialsSecretReconcile,
                    ConditionStatus::True,
                    "NotRequired",
                    "no credentials Secret is needed",
                    false,
                );
                true
            }
            Some(secret) => {
                let result = converge(self.client.as_ref(), secret, status, |status, result| {
                    record_secret(status, now, result);
                })
                .await;
                match result {
                    Ok(op) => {
                        debug!(operation = %op, "Converged credentials Secret");
                        true
                    }
                    Err(e) => {
                        warn!(error = %e, "Credentials Secret not converged");
                        metrics::increment_reconciliation_errors("ConvergenceError");
                        tally.record(&ComponentError::from(e));
                        false
                    }
                }
            }
        };

        if !secret_ok {
            block_components(status, now, &enabled, &mut components);
            return (tally.outcome(), components);
        }

        let refs = credential_refs(meta, spec, secret.as_ref());
        for component in enabled {
            let result = self
                .reconcile_component(meta, spec, &features, &refs, component, status, now)
                .await;
            if let Err(e) = &result {
                warn!(component = %component, reason = e.reason(), error = %e, "Component not reconciled");
                metrics::increment_component_failures(component.as_str(), e.reason());
                metrics::increment_reconciliation_errors(e.reason());
                tally.record(e);
            }
            components.insert(component, result);
        }
        (tally.outcome(), components)
    }

    /// Put the cluster agent token in the pass status when one is needed: the
    /// token already stored in the live Secret is adopted, otherwise a new one
    /// is generated. A pass running on a stale object never rotates the token.
    async fn settle_cluster_agent_token(
        &self,
        meta: &AgentMeta,
        spec: &DatadogAgentSpec,
        status: &mut DatadogAgentStatus,
    ) -> Result<(), ConvergenceError> {
        if !needs_generated_token(spec) || status.cluster_agent_token.is_some() {
            return Ok(());
        }
        let live = ObjectClient::<Secret>::get(self.client.as_ref(), &meta.namespace, &meta.name)
            .await
            .map_err(|e| ConvergenceError::from_client("Secret", &meta.name, e))?;
        if adopt_live_token(spec, status, live.as_ref()) {
            info!("Adopted cluster agent token from the live Secret");
        } else if ensure_cluster_agent_token(spec, status) {
            info!("Generated cluster agent token");
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments, reason = "Pass-scoped inputs of one component")]
    async fn reconcile_component(
        &self,
        meta: &AgentMeta,
        spec: &DatadogAgentSpec,
        features: &[Box<dyn Feature>],
        refs: &CredentialRefs,
        component: ComponentName,
        status: &mut DatadogAgentStatus,
        now: &str,
    ) -> Result<Operation, ComponentError> {
        let draft = match compose(meta, spec, features, refs, component) {
            Ok(draft) => draft,
            Err(e) => {
                let result = Err(e.clone());
                record_component(status, now, component, &result);
                return Err(e);
            }
        };

        let record = |status: &mut DatadogAgentStatus, result: &Result<Operation, ConvergenceError>| {
            let result = result.clone().map_err(ComponentError::from);
            record_component(status, now, component, &result);
        };
        let op = match draft.into_workload(meta) {
            DesiredWorkload::DaemonSet(ds) => converge(self.client.as_ref(), ds, status, record).await?,
            DesiredWorkload::Deployment(d) => converge(self.client.as_ref(), d, status, record).await?,
        };
        debug!(component = %component, operation = %op, "Converged component");
        Ok(op)
    }

    /// Number of resources currently backing off after a failed pass
    #[must_use]
    pub fn tracked_backoffs(&self) -> usize {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn clear_backoff(&self, meta: &AgentMeta) {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if states.remove(&backoff_key(&meta.namespace, &meta.name)).is_some() {
            debug!("Cleared backoff state");
        }
    }
}

/// Build the desired pod template of `component`, without touching the cluster
fn compose(
    meta: &AgentMeta,
    spec: &DatadogAgentSpec,
    features: &[Box<dyn Feature>],
    refs: &CredentialRefs,
    component: ComponentName,
) -> Result<ComponentDraft, ComponentError> {
    let extra = required_containers(features, component);
    let mut draft = ComponentDraft::new(meta, component, &extra);
    apply_features(features, component, &mut draft.manager)?;
    apply_global(spec, component, &mut draft.manager, refs)?;
    if let Some(ov) = spec.component_override(component) {
        let registry = spec.global.as_ref().and_then(|g| g.registry.as_deref());
        apply_override(&mut draft, ov, registry)?;
    }
    Ok(draft)
}

fn record_component(
    status: &mut DatadogAgentStatus,
    now: &str,
    component: ComponentName,
    result: &Result<Operation, ComponentError>,
) {
    match result {
        Ok(_) => update_condition(
            status,
            now,
            component.condition_type(),
            ConditionStatus::True,
            "Reconciled",
            &format!("{component} is up to date"),
            false,
        ),
        Err(e) => update_condition(
            status,
            now,
            component.condition_type(),
            ConditionStatus::False,
            e.reason(),
            &e.to_string(),
            true,
        ),
    }
}

/// Mark every enabled component as waiting on the credentials Secret
fn block_components(
    status: &mut DatadogAgentStatus,
    now: &str,
    enabled: &[ComponentName],
    components: &mut BTreeMap<ComponentName, Result<Operation, ComponentError>>,
) {
    for component in enabled {
        let result = Err(ComponentError::CredentialsNotReady);
        record_component(status, now, *component, &result);
        components.insert(*component, result);
    }
}

fn record_secret(
    status: &mut DatadogAgentStatus,
    now: &str,
    result: &Result<Operation, ConvergenceError>,
) {
    match result {
        Ok(_) => update_condition(
            status,
            now,
            ConditionType::CredentialsSecretReconcile,
            ConditionStatus::True,
            "Reconciled",
            "credentials Secret is up to date",
            false,
        ),
        Err(e) => update_condition(
            status,
            now,
            ConditionType::CredentialsSecretReconcile,
            ConditionStatus::False,
            "ConvergenceError",
            &e.to_string(),
            true,
        ),
    }
}
