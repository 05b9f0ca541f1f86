//! Machine record access.

use async_trait::async_trait;
use kube::Api;
use kube::api::{ListParams, Patch, PatchParams};
use tracing::debug;

use super::crd::MachineResource;
use crate::error::{MupError, Result};
use crate::machine::Machine;

/// Field manager recorded on machine updates.
const FIELD_MANAGER: &str = "mup";

/// List, read, and update machine records.
///
/// Implementations must be safe to share between concurrent worker tasks.
#[async_trait]
pub trait MachineRepository: Send + Sync {
    /// All machines, in listing order.
    async fn list(&self) -> Result<Vec<Machine>>;

    async fn get(&self, name: &str) -> Result<Machine>;

    /// Persist the desired versions of `machine`.
    ///
    /// Fails with [`MupError::Conflict`] if the record changed since it was read.
    async fn update(&self, machine: &Machine) -> Result<Machine>;
}

/// [`MachineRepository`] backed by the Cluster API `Machine` resource.
pub struct KubeMachineRepository {
    api: Api<MachineResource>,
}

impl KubeMachineRepository {
    pub fn new(client: kube::Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }
}

/// Merge patch carrying the desired versions and the resource version they
/// were derived from, so the API server rejects updates against stale reads.
fn version_patch(machine: &Machine) -> serde_json::Value {
    let mut versions = serde_json::json!({ "kubelet": machine.kubelet_version });
    if let Some(ref cp) = machine.control_plane_version {
        versions["controlPlane"] = serde_json::Value::String(cp.clone());
    }

    let mut patch = serde_json::json!({ "spec": { "versions": versions } });
    if let Some(ref rv) = machine.resource_version {
        patch["metadata"] = serde_json::json!({ "resourceVersion": rv });
    }
    patch
}

#[async_trait]
impl MachineRepository for KubeMachineRepository {
    async fn list(&self) -> Result<Vec<Machine>> {
        let list = self
            .api
            .list(&ListParams::default())
            .await
            .map_err(|e| MupError::kube("Failed to list machines", &e))?;

        debug!("Found {} machines", list.items.len());
        list.items.iter().map(Machine::try_from).collect()
    }

    async fn get(&self, name: &str) -> Result<Machine> {
        let res = self
            .api
            .get(name)
            .await
            .map_err(|e| MupError::kube(&format!("Failed to get machine {name}"), &e))?;
        Machine::try_from(&res)
    }

    async fn update(&self, machine: &Machine) -> Result<Machine> {
        let patch = version_patch(machine);
        debug!("Patching machine {} with {}", machine.name, patch);

        let res = self
            .api
            .patch(
                &machine.name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(patch),
            )
            .await
            .map_err(|e| MupError::kube(&format!("Failed to update machine {}", machine.name), &e))?;
        Machine::try_from(&res)
    }
}
