//! # Errors
//!
//! Error taxonomy for a reconciliation pass.
//!
//! - [`ConfigTranslationError`] - the configuration cannot be normalized; aborts the whole pass
//! - [`ConflictError`] - two writers disagreed on the same template entry
//! - [`FeatureError`] - a feature failed to mutate a component template
//! - [`OverrideError`] - a user override is malformed for the resulting template
//! - [`ConvergenceError`] - the API server rejected a read or write (transient or terminal)
//!
//! [`ComponentError`] wraps the component-scoped errors so each one can be
//! recorded on the component's status condition. Nothing here is fatal to the process.

use std::fmt;
use thiserror::Error;

/// Kind of entry held by the pod template manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Volume,
    VolumeMount,
    EnvVar,
    Port,
    InitContainer,
    PodField,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Volume => "volume",
            Self::VolumeMount => "volume mount",
            Self::EnvVar => "env var",
            Self::Port => "port",
            Self::InitContainer => "init container",
            Self::PodField => "pod field",
        };
        f.write_str(s)
    }
}

/// Legacy configuration that cannot be mapped onto the structured schema
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigTranslationError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("{field} sets both configData and configMap")]
    AmbiguousCustomConfig { field: String },

    #[error("cluster checks runner is enabled but {requirement} is disabled")]
    ChecksRunnerWithoutClusterChecks { requirement: &'static str },
}

/// An insertion collided with an existing entry carrying a different value
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("conflicting {kind} '{name}'{}: existing {existing}, attempted {attempted}", container_suffix(.container.as_deref()))]
pub struct ConflictError {
    pub kind: EntryKind,
    pub container: Option<String>,
    pub name: String,
    pub existing: String,
    pub attempted: String,
}

fn container_suffix(container: Option<&str>) -> String {
    container.map_or_else(String::new, |c| format!(" in container '{c}'"))
}

/// Failure raised by the pod template manager
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error("container '{0}' is not part of the pod template")]
    UnknownContainer(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeatureError {
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error("container '{0}' is not part of the pod template")]
    UnknownContainer(String),

    #[error("feature {feature}: {message}")]
    InvalidValue {
        feature: &'static str,
        message: String,
    },
}

impl From<TemplateError> for FeatureError {
    fn from(e: TemplateError) -> Self {
        match e {
            TemplateError::Conflict(c) => Self::Conflict(c),
            TemplateError::UnknownContainer(c) => Self::UnknownContainer(c),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OverrideError {
    #[error("override for {component} references unknown container '{container}'")]
    UnknownContainer { component: String, container: String },

    #[error("container '{container}' mounts '{mount}' but volume '{mount}' does not exist")]
    MissingVolume { container: String, mount: String },

    #[error(transparent)]
    Conflict(#[from] ConflictError),
}

impl OverrideError {
    /// Attribute a template failure to `component`
    #[must_use]
    pub fn from_template(component: &str, e: TemplateError) -> Self {
        match e {
            TemplateError::Conflict(c) => Self::Conflict(c),
            TemplateError::UnknownContainer(container) => Self::UnknownContainer {
                component: component.to_string(),
                container,
            },
        }
    }
}

/// Failure reported by the cluster client
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("API error {code}: {message}")]
    Api { code: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid object: {0}")]
    InvalidObject(String),
}

impl ClientError {
    /// Conflicts, throttling, server errors and transport failures clear up on retry
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { code, .. } => *code == 409 || *code == 429 || *code >= 500,
            Self::Transport(_) => true,
            Self::Serialization(_) | Self::InvalidObject(_) => false,
        }
    }
}

impl From<kube::Error> for ClientError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(api_err) => Self::Api {
                code: api_err.code,
                message: api_err.to_string(),
            },
            kube::Error::SerdeError(e) => Self::Serialization(e.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvergenceError {
    #[error("transient failure converging {kind} {name}: {source}")]
    Transient {
        kind: &'static str,
        name: String,
        source: ClientError,
    },

    #[error("terminal failure converging {kind} {name}: {source}")]
    Terminal {
        kind: &'static str,
        name: String,
        source: ClientError,
    },
}

impl ConvergenceError {
    #[must_use]
    pub fn from_client(kind: &'static str, name: &str, source: ClientError) -> Self {
        let name = name.to_string();
        if source.is_transient() {
            Self::Transient { kind, name, source }
        } else {
            Self::Terminal { kind, name, source }
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Error that aborted a single component's pass
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComponentError {
    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Override(#[from] OverrideError),

    #[error(transparent)]
    Convergence(#[from] ConvergenceError),

    #[error("credentials secret is not ready")]
    CredentialsNotReady,
}

impl ComponentError {
    /// Reason recorded on the component's status condition
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Feature(FeatureError::Conflict(_)) | Self::Override(OverrideError::Conflict(_)) => {
                "ConflictError"
            }
            Self::Feature(_) => "FeatureError",
            Self::Override(_) => "OverrideError",
            Self::Convergence(_) => "ConvergenceError",
            Self::CredentialsNotReady => "CredentialsSecretNotReady",
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Convergence(e) if e.is_transient())
    }
}
