//! # Error Policy
//!
//! Requeue decision for a pass that returned an error. Each resource keeps its
//! own Fibonacci backoff. The entry is dropped by the reconciler as soon as a
//! pass ends without a transient failure, so only failing resources are tracked.

use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::controller::snapshot::AgentResource;
use crate::observability::metrics;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::{Arc, PoisonError};
use tracing::{error, info, info_span};

/// Backoff state for a specific resource
#[derive(Debug, Clone)]
pub(crate) struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }
}

/// Key of a resource in the backoff map
pub(crate) fn backoff_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

#[allow(
    clippy::needless_pass_by_value,
    reason = "Signature required by kube-runtime's Controller::run"
)]
pub fn error_policy<K: AgentResource>(
    agent: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = agent.name_any();
    let namespace = agent.namespace().unwrap_or_default();
    let span = info_span!(
        "error_policy",
        resource.name = %name,
        resource.namespace = %namespace,
    );
    let _guard = span.enter();

    let (backoff_secs, error_count) = {
        let config = ctx.config();
        let mut states = ctx
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = states
            .entry(backoff_key(&namespace, &name))
            .or_insert_with(|| BackoffState::new(config.backoff_min_secs, config.backoff_max_secs));
        state.increment_error();
        (state.backoff.next_backoff_seconds(), state.error_count)
    };

    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::seconds(i64::try_from(backoff_secs).unwrap_or(i64::MAX));
    error!(error_count, error = %error, "Reconciliation failed");
    info!(
        backoff_secs,
        next_retry = %next_trigger_time.to_rfc3339(),
        "Retrying with Fibonacci backoff"
    );
    let reason = match error {
        ReconcilerError::MissingObjectKey => "MissingObjectKey",
        ReconcilerError::Status(_) => "StatusPatchError",
        ReconcilerError::Transient(_) => "Transient",
    };
    metrics::increment_reconciliation_errors(reason);

    Action::requeue(std::time::Duration::from_secs(backoff_secs))
}
