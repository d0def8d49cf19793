//! # Pod Template Manager
//!
//! Mutable builder around one component's `PodTemplateSpec`.
//!
//! Features and the global settings layer never touch the template directly: they
//! go through the narrow `add_*` / `set_pod_field` capabilities below, which key
//! every entry by identity and detect collisions.
//!
//! | Entry | Identity |
//! |-------|----------|
//! | volume | volume name |
//! | volume mount | (container, mount name) |
//! | env var | (container, env var name) |
//! | port | (container, port name, or container port + protocol when unnamed) |
//! | init container | container name |
//! | pod field | field |
//!
//! Inserting an identical entry twice is a no-op; inserting a different value
//! under an existing identity fails with a [`ConflictError`] and leaves the
//! template untouched. Entries keep their insertion order.

use crate::error::{ConflictError, EntryKind, TemplateError};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, Volume, VolumeMount,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Pod-level scalar fields a feature may set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodField {
    HostPid(bool),
}

impl PodField {
    fn key(&self) -> &'static str {
        match self {
            Self::HostPid(_) => "hostPID",
        }
    }

    fn value(&self) -> String {
        match self {
            Self::HostPid(v) => v.to_string(),
        }
    }

    fn apply(&self, spec: &mut PodSpec) {
        match self {
            Self::HostPid(v) => spec.host_pid = Some(*v),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PodTemplateManager {
    template: PodTemplateSpec,
    pod_fields: BTreeMap<&'static str, PodField>,
}

impl PodTemplateManager {
    #[must_use]
    pub fn new(template: PodTemplateSpec) -> Self {
        Self {
            template,
            pod_fields: BTreeMap::new(),
        }
    }

    /// Accumulated template
    #[must_use]
    pub fn pod_template(&self) -> &PodTemplateSpec {
        &self.template
    }

    #[must_use]
    pub fn into_pod_template(self) -> PodTemplateSpec {
        self.template
    }

    /// Direct access for the override layer, which replaces values outright
    pub(crate) fn template_mut(&mut self) -> &mut PodTemplateSpec {
        &mut self.template
    }

    #[must_use]
    pub fn has_container(&self, name: &str) -> bool {
        self.pod_spec()
            .is_some_and(|spec| spec.containers.iter().any(|c| c.name == name))
    }

    #[must_use]
    pub fn container_names(&self) -> Vec<String> {
        self.pod_spec()
            .map(|spec| spec.containers.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn add_volume(&mut self, volume: Volume) -> Result<(), TemplateError> {
        let volumes = self
            .pod_spec_mut()
            .volumes
            .get_or_insert_with(Vec::new);
        insert_unique(volumes, volume, EntryKind::Volume, None, |v| v.name.clone())
    }

    pub fn add_volume_mount(
        &mut self,
        container: &str,
        mount: VolumeMount,
    ) -> Result<(), TemplateError> {
        let c = self.container_mut(container)?;
        let mounts = c.volume_mounts.get_or_insert_with(Vec::new);
        insert_unique(mounts, mount, EntryKind::VolumeMount, Some(container), |m| {
            m.name.clone()
        })
    }

    pub fn add_env_var(&mut self, container: &str, env: EnvVar) -> Result<(), TemplateError> {
        let c = self.container_mut(container)?;
        let envs = c.env.get_or_insert_with(Vec::new);
        insert_unique(envs, env, EntryKind::EnvVar, Some(container), |e| {
            e.name.clone()
        })
    }

    pub fn add_port(&mut self, container: &str, port: ContainerPort) -> Result<(), TemplateError> {
        let c = self.container_mut(container)?;
        let ports = c.ports.get_or_insert_with(Vec::new);
        insert_unique(ports, port, EntryKind::Port, Some(container), port_identity)
    }

    pub fn add_init_container(&mut self, init: Container) -> Result<(), TemplateError> {
        let inits = self
            .pod_spec_mut()
            .init_containers
            .get_or_insert_with(Vec::new);
        insert_unique(inits, init, EntryKind::InitContainer, None, |c| {
            c.name.clone()
        })
    }

    /// Set a pod-level field. Fails when this manager already set it to another value.
    pub fn set_pod_field(&mut self, field: PodField) -> Result<(), TemplateError> {
        let key = field.key();
        if let Some(existing) = self.pod_fields.get(key) {
            if *existing == field {
                return Ok(());
            }
            return Err(ConflictError {
                kind: EntryKind::PodField,
                container: None,
                name: key.to_string(),
                existing: existing.value(),
                attempted: field.value(),
            }
            .into());
        }
        field.apply(self.pod_spec_mut());
        self.pod_fields.insert(key, field);
        Ok(())
    }

    fn pod_spec(&self) -> Option<&PodSpec> {
        self.template.spec.as_ref()
    }

    fn pod_spec_mut(&mut self) -> &mut PodSpec {
        self.template.spec.get_or_insert_with(PodSpec::default)
    }

    fn container_mut(&mut self, name: &str) -> Result<&mut Container, TemplateError> {
        self.pod_spec_mut()
            .containers
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| TemplateError::UnknownContainer(name.to_string()))
    }
}

fn port_identity(port: &ContainerPort) -> String {
    match &port.name {
        Some(name) => name.clone(),
        None => format!(
            "{}/{}",
            port.container_port,
            port.protocol.as_deref().unwrap_or("TCP")
        ),
    }
}

fn insert_unique<T, F>(
    entries: &mut Vec<T>,
    entry: T,
    kind: EntryKind,
    container: Option<&str>,
    identity: F,
) -> Result<(), TemplateError>
where
    T: PartialEq + Serialize,
    F: Fn(&T) -> String,
{
    let id = identity(&entry);
    if let Some(existing) = entries.iter().find(|e| identity(e) == id) {
        if *existing == entry {
            return Ok(());
        }
        return Err(ConflictError {
            kind,
            container: container.map(str::to_string),
            name: id,
            existing: describe(existing),
            attempted: describe(&entry),
        }
        .into());
    }
    entries.push(entry);
    Ok(())
}

fn describe<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Build an env var with a literal value
#[must_use]
pub fn env_var(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

/// Build a host-path volume
#[must_use]
pub fn host_path_volume(name: &str, path: &str) -> Volume {
    Volume {
        name: name.to_string(),
        host_path: Some(k8s_openapi::api::core::v1::HostPathVolumeSource {
            path: path.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[must_use]
pub fn volume_mount(name: &str, mount_path: &str, read_only: bool) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: mount_path.to_string(),
        read_only: read_only.then_some(true),
        ..Default::default()
    }
}
