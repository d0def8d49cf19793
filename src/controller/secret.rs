//! # Credentials Secret
//!
//! Decides whether the controller must manage a credentials Secret for a
//! `DatadogAgent`, and what goes in it.
//!
//! A key is *sufficient* without a managed Secret when either:
//!
//! - an existing secret is referenced and no inline key is given, or
//! - neither is given and the controller's own environment provides the key
//!
//! The managed Secret is skipped only when both keys are sufficient and the
//! cluster agent is disabled (the cluster agent always needs the token).

use crate::component::owner_reference;
use crate::config::ControllerConfig;
use crate::constants::{
    API_KEY_KEY, APP_KEY_KEY, LABEL_INSTANCE, LABEL_MANAGED_BY, LABEL_NAME, MANAGED_BY_VALUE,
    TOKEN_KEY,
};
use crate::controller::snapshot::AgentMeta;
use crate::crd::v2alpha1::{DatadogAgentSpec, DatadogCredentials};
use crate::crd::{DatadogAgentStatus, SecretConfig};
use k8s_openapi::api::core::v1::{Secret, SecretKeySelector};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use uuid::Uuid;

#[must_use]
pub fn check_api_key_sufficiency(creds: &DatadogCredentials, env_fallback: Option<&str>) -> bool {
    key_sufficiency(creds.api_key.as_deref(), creds.api_secret.as_ref(), env_fallback)
}

#[must_use]
pub fn check_app_key_sufficiency(creds: &DatadogCredentials, env_fallback: Option<&str>) -> bool {
    key_sufficiency(creds.app_key.as_deref(), creds.app_secret.as_ref(), env_fallback)
}

fn key_sufficiency(
    inline: Option<&str>,
    secret: Option<&SecretConfig>,
    env_fallback: Option<&str>,
) -> bool {
    let inline = inline.filter(|k| !k.is_empty());
    match (inline, secret) {
        (None, Some(_)) => true,
        (None, None) => env_fallback.is_some_and(|k| !k.is_empty()),
        (Some(_), _) => false,
    }
}

/// Credentials of the spec, with empty inline keys treated as absent
fn credentials(spec: &DatadogAgentSpec) -> Option<DatadogCredentials> {
    let non_empty = |key: &Option<String>| key.clone().filter(|k| !k.is_empty());
    spec.global
        .as_ref()
        .and_then(|g| g.credentials.as_ref())
        .map(|creds| DatadogCredentials {
            api_key: non_empty(&creds.api_key),
            app_key: non_empty(&creds.app_key),
            ..creds.clone()
        })
}

/// Whether the controller must manage a credentials Secret
#[must_use]
pub fn need_agent_secret(spec: &DatadogAgentSpec, config: &ControllerConfig) -> bool {
    let Some(creds) = credentials(spec) else {
        return false;
    };
    let sufficient = check_api_key_sufficiency(&creds, config.api_key_fallback.as_deref())
        && check_app_key_sufficiency(&creds, config.app_key_fallback.as_deref());
    !(sufficient && !spec.cluster_agent_enabled())
}

/// Whether the cluster agent runs on a controller-owned token
#[must_use]
pub fn needs_generated_token(spec: &DatadogAgentSpec) -> bool {
    let explicit = spec
        .global
        .as_ref()
        .and_then(|g| g.cluster_agent_token.as_deref())
        .is_some_and(|t| !t.is_empty());
    spec.cluster_agent_enabled() && !explicit
}

/// Copy the token stored in the live managed Secret into `status` when the
/// status does not carry one yet. Returns `true` when a token was adopted.
pub fn adopt_live_token(
    spec: &DatadogAgentSpec,
    status: &mut DatadogAgentStatus,
    live: Option<&Secret>,
) -> bool {
    if !needs_generated_token(spec) || status.cluster_agent_token.is_some() {
        return false;
    }
    let token = live
        .and_then(|s| s.data.as_ref())
        .and_then(|d| d.get(TOKEN_KEY))
        .and_then(|v| String::from_utf8(v.0.clone()).ok())
        .filter(|t| !t.is_empty());
    match token {
        Some(token) => {
            status.cluster_agent_token = Some(token);
            true
        }
        None => false,
    }
}

/// Generate the cluster agent token into `status` when one is needed and none
/// exists yet. Returns `true` when a token was generated.
pub fn ensure_cluster_agent_token(spec: &DatadogAgentSpec, status: &mut DatadogAgentStatus) -> bool {
    if !needs_generated_token(spec) || status.cluster_agent_token.is_some() {
        return false;
    }
    status.cluster_agent_token = Some(Uuid::new_v4().simple().to_string());
    true
}

/// Token written to the managed Secret, by precedence
fn resolve_token(spec: &DatadogAgentSpec, status: &DatadogAgentStatus) -> Option<String> {
    let explicit = spec
        .global
        .as_ref()
        .and_then(|g| g.cluster_agent_token.clone())
        .filter(|t| !t.is_empty());
    explicit.or_else(|| {
        spec.cluster_agent_enabled()
            .then(|| status.cluster_agent_token.clone())
            .flatten()
    })
}

/// Desired credentials Secret, or `None` when no Secret is needed
#[must_use]
pub fn desired_secret(
    meta: &AgentMeta,
    spec: &DatadogAgentSpec,
    status: &DatadogAgentStatus,
    config: &ControllerConfig,
) -> Option<Secret> {
    if !need_agent_secret(spec, config) {
        return None;
    }
    let creds = credentials(spec)?;

    let mut data = BTreeMap::new();
    let mut put = |key: &str, value: Option<String>| {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            data.insert(key.to_string(), ByteString(v.into_bytes()));
        }
    };
    put(
        API_KEY_KEY,
        creds.api_key.clone().or_else(|| config.api_key_fallback.clone()),
    );
    put(
        APP_KEY_KEY,
        creds.app_key.clone().or_else(|| config.app_key_fallback.clone()),
    );
    put(TOKEN_KEY, resolve_token(spec, status));

    Some(Secret {
        metadata: ObjectMeta {
            name: Some(meta.name.clone()),
            namespace: Some(meta.namespace.clone()),
            labels: Some(BTreeMap::from([
                (LABEL_NAME.to_string(), "datadog-agent".to_string()),
                (LABEL_INSTANCE.to_string(), meta.name.clone()),
                (LABEL_MANAGED_BY.to_string(), MANAGED_BY_VALUE.to_string()),
            ])),
            owner_references: owner_reference(meta).map(|o| vec![o]),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(data),
        ..Default::default()
    })
}

/// Where each credential env var reads its value from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialRefs {
    pub api_key: Option<SecretKeySelector>,
    pub app_key: Option<SecretKeySelector>,
    pub token: Option<SecretKeySelector>,
}

/// Resolve secret references for the credential env vars. A user-referenced
/// secret wins; otherwise keys present in the managed Secret are used.
#[must_use]
pub fn credential_refs(
    meta: &AgentMeta,
    spec: &DatadogAgentSpec,
    managed: Option<&Secret>,
) -> CredentialRefs {
    let creds = credentials(spec);
    let managed_has = |key: &str| {
        managed
            .and_then(|s| s.data.as_ref())
            .is_some_and(|d| d.contains_key(key))
    };
    let managed_ref = |key: &str| managed_has(key).then(|| selector(&meta.name, key));
    let user_ref = |secret: Option<&SecretConfig>, default_key: &str| {
        secret.map(|s| selector(&s.secret_name, s.key_name.as_deref().unwrap_or(default_key)))
    };

    let api_secret = creds.as_ref().and_then(|c| c.api_secret.as_ref());
    let app_secret = creds.as_ref().and_then(|c| c.app_secret.as_ref());
    let api_inline = creds.as_ref().is_some_and(|c| c.api_key.is_some());
    let app_inline = creds.as_ref().is_some_and(|c| c.app_key.is_some());

    CredentialRefs {
        api_key: if api_inline {
            managed_ref(API_KEY_KEY)
        } else {
            user_ref(api_secret, API_KEY_KEY).or_else(|| managed_ref(API_KEY_KEY))
        },
        app_key: if app_inline {
            managed_ref(APP_KEY_KEY)
        } else {
            user_ref(app_secret, APP_KEY_KEY).or_else(|| managed_ref(APP_KEY_KEY))
        },
        token: managed_ref(TOKEN_KEY),
    }
}

fn selector(name: &str, key: &str) -> SecretKeySelector {
    SecretKeySelector {
        name: name.to_string(),
        key: key.to_string(),
        optional: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::v2alpha1::{DatadogAgentComponentOverride, DatadogAgentOverrides, GlobalConfig};
    use crate::crd::ApiVersion;

    fn meta() -> AgentMeta {
        AgentMeta {
            name: "datadog".to_string(),
            namespace: "monitoring".to_string(),
            uid: None,
            generation: Some(1),
            api_version: ApiVersion::V2Alpha1,
        }
    }

    fn secret_ref(name: &str) -> Option<SecretConfig> {
        Some(SecretConfig {
            secret_name: name.to_string(),
            key_name: None,
        })
    }

    fn spec(creds: Option<DatadogCredentials>, cluster_agent: bool) -> DatadogAgentSpec {
        DatadogAgentSpec {
            global: Some(GlobalConfig {
                credentials: creds,
                ..Default::default()
            }),
            overrides: (!cluster_agent).then(|| DatadogAgentOverrides {
                cluster_agent: Some(DatadogAgentComponentOverride {
                    disabled: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_key_sufficiency() {
        let existing = DatadogCredentials {
            api_secret: secret_ref("keys"),
            ..Default::default()
        };
        assert!(check_api_key_sufficiency(&existing, None));

        let inline = DatadogCredentials {
            api_key: Some("abc".to_string()),
            api_secret: secret_ref("keys"),
            ..Default::default()
        };
        assert!(!check_api_key_sufficiency(&inline, Some("env")));

        let nothing = DatadogCredentials::default();
        assert!(check_api_key_sufficiency(&nothing, Some("env")));
        assert!(!check_api_key_sufficiency(&nothing, None));
        assert!(!check_api_key_sufficiency(&nothing, Some("")));
    }

    #[test]
    fn test_no_credentials_means_no_secret() {
        let spec = DatadogAgentSpec::default();
        assert!(!need_agent_secret(&spec, &ControllerConfig::default()));
        assert!(desired_secret(&meta(), &spec, &DatadogAgentStatus::default(), &ControllerConfig::default()).is_none());
    }

    #[test]
    fn test_existing_secrets_without_cluster_agent_need_no_secret() {
        let creds = DatadogCredentials {
            api_secret: secret_ref("keys"),
            app_secret: secret_ref("keys"),
            ..Default::default()
        };
        let config = ControllerConfig::default();
        assert!(!need_agent_secret(&spec(Some(creds.clone()), false), &config));
        assert!(need_agent_secret(&spec(Some(creds), true), &config));
    }

    #[test]
    fn test_inline_keys_need_secret() {
        let creds = DatadogCredentials {
            api_key: Some("api".to_string()),
            app_key: Some("app".to_string()),
            ..Default::default()
        };
        let secret = desired_secret(
            &meta(),
            &spec(Some(creds), false),
            &DatadogAgentStatus::default(),
            &ControllerConfig::default(),
        )
        .unwrap();
        assert_eq!(secret.metadata.name.as_deref(), Some("datadog"));
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        let data = secret.data.unwrap();
        assert_eq!(data.get("api_key"), Some(&ByteString(b"api".to_vec())));
        assert_eq!(data.get("app_key"), Some(&ByteString(b"app".to_vec())));
        assert!(!data.contains_key("token"));
    }

    #[test]
    fn test_env_fallback_fills_missing_keys() {
        let creds = DatadogCredentials {
            api_key: Some("api".to_string()),
            ..Default::default()
        };
        let config = ControllerConfig {
            app_key_fallback: Some("from-env".to_string()),
            ..Default::default()
        };
        let secret = desired_secret(
            &meta(),
            &spec(Some(creds), false),
            &DatadogAgentStatus::default(),
            &config,
        )
        .unwrap();
        assert_eq!(
            secret.data.unwrap().get("app_key"),
            Some(&ByteString(b"from-env".to_vec()))
        );
    }

    #[test]
    fn test_token_precedence() {
        let creds = DatadogCredentials {
            api_key: Some("api".to_string()),
            ..Default::default()
        };
        let status = DatadogAgentStatus {
            cluster_agent_token: Some("generated".to_string()),
            ..Default::default()
        };

        let mut explicit = spec(Some(creds.clone()), true);
        explicit.global.as_mut().unwrap().cluster_agent_token = Some("explicit".to_string());
        assert_eq!(resolve_token(&explicit, &status).as_deref(), Some("explicit"));

        let persisted = spec(Some(creds.clone()), true);
        assert_eq!(resolve_token(&persisted, &status).as_deref(), Some("generated"));

        let no_dca = spec(Some(creds), false);
        assert_eq!(resolve_token(&no_dca, &status), None);
    }

    #[test]
    fn test_token_generated_once() {
        let spec = spec(None, true);
        let mut status = DatadogAgentStatus::default();
        assert!(ensure_cluster_agent_token(&spec, &mut status));
        let token = status.cluster_agent_token.clone().unwrap();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));

        assert!(!ensure_cluster_agent_token(&spec, &mut status));
        assert_eq!(status.cluster_agent_token, Some(token));
    }

    #[test]
    fn test_no_token_without_cluster_agent() {
        let mut status = DatadogAgentStatus::default();
        assert!(!ensure_cluster_agent_token(&spec(None, false), &mut status));
        assert_eq!(status.cluster_agent_token, None);
    }

    #[test]
    fn test_empty_inline_keys_count_as_absent() {
        let creds = DatadogCredentials {
            api_key: Some(String::new()),
            api_secret: secret_ref("user-keys"),
            app_secret: secret_ref("user-keys"),
            ..Default::default()
        };
        let spec = spec(Some(creds), false);
        let config = ControllerConfig::default();

        assert!(!need_agent_secret(&spec, &config));
        let managed = desired_secret(&meta(), &spec, &DatadogAgentStatus::default(), &config);
        assert!(managed.is_none());
        let refs = credential_refs(&meta(), &spec, managed.as_ref());
        assert_eq!(refs.api_key, Some(selector("user-keys", "api_key")));
        assert_eq!(refs.app_key, Some(selector("user-keys", "app_key")));
    }

    #[test]
    fn test_empty_inline_key_is_not_written() {
        let creds = DatadogCredentials {
            api_key: Some(String::new()),
            ..Default::default()
        };
        let config = ControllerConfig {
            api_key_fallback: Some("from-env".to_string()),
            ..Default::default()
        };
        let secret = desired_secret(
            &meta(),
            &spec(Some(creds), true),
            &DatadogAgentStatus::default(),
            &config,
        )
        .unwrap();
        assert_eq!(
            secret.data.unwrap().get("api_key"),
            Some(&ByteString(b"from-env".to_vec()))
        );
    }

    #[test]
    fn test_live_token_is_adopted() {
        let spec = spec(None, true);
        let live = Secret {
            data: Some(BTreeMap::from([(
                "token".to_string(),
                ByteString(b"live-token".to_vec()),
            )])),
            ..Default::default()
        };

        let mut status = DatadogAgentStatus::default();
        assert!(adopt_live_token(&spec, &mut status, Some(&live)));
        assert_eq!(status.cluster_agent_token.as_deref(), Some("live-token"));
        assert!(!ensure_cluster_agent_token(&spec, &mut status));

        // The status already carries a token
        let mut status = DatadogAgentStatus {
            cluster_agent_token: Some("persisted".to_string()),
            ..Default::default()
        };
        assert!(!adopt_live_token(&spec, &mut status, Some(&live)));
        assert_eq!(status.cluster_agent_token.as_deref(), Some("persisted"));

        let mut status = DatadogAgentStatus::default();
        assert!(!adopt_live_token(&spec, &mut status, None));
        assert!(!adopt_live_token(&spec, &mut status, Some(&Secret::default())));
        assert_eq!(status.cluster_agent_token, None);
    }

    #[test]
    fn test_explicit_token_is_never_adopted() {
        let mut spec = spec(None, true);
        spec.global.as_mut().unwrap().cluster_agent_token = Some("explicit".to_string());
        let live = Secret {
            data: Some(BTreeMap::from([(
                "token".to_string(),
                ByteString(b"old".to_vec()),
            )])),
            ..Default::default()
        };
        let mut status = DatadogAgentStatus::default();
        assert!(!needs_generated_token(&spec));
        assert!(!adopt_live_token(&spec, &mut status, Some(&live)));
        assert_eq!(status.cluster_agent_token, None);
    }

    #[test]
    fn test_credential_refs_prefer_user_secret() {
        let creds = DatadogCredentials {
            api_secret: Some(SecretConfig {
                secret_name: "keys".to_string(),
                key_name: Some("api-key".to_string()),
            }),
            app_key: Some("app".to_string()),
            ..Default::default()
        };
        let spec = spec(Some(creds), true);
        let status = DatadogAgentStatus {
            cluster_agent_token: Some("t".to_string()),
            ..Default::default()
        };
        let managed = desired_secret(&meta(), &spec, &status, &ControllerConfig::default());
        let refs = credential_refs(&meta(), &spec, managed.as_ref());

        assert_eq!(refs.api_key, Some(selector("keys", "api-key")));
        assert_eq!(refs.app_key, Some(selector("datadog", "app_key")));
        assert_eq!(refs.token, Some(selector("datadog", "token")));
    }
}
