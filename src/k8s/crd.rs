//! Cluster API `cluster.k8s.io/v1alpha1` `Machine` resource.
//!
//! Only the fields the upgrade reads or writes are modelled; the rest of the
//! record is left untouched because updates are sent as merge patches.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{MupError, Result};
use crate::machine::{Machine, MachineRole};

/// Machine spec subset.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "cluster.k8s.io",
    version = "v1alpha1",
    kind = "Machine",
    root = "MachineResource",
    namespaced,
    status = "MachineResourceStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineResourceSpec {
    #[serde(default)]
    pub versions: MachineVersionInfo,
}

/// Desired software versions of a machine.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineVersionInfo {
    #[serde(default)]
    pub kubelet: String,

    /// Set only on control plane machines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineResourceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_ref: Option<NodeReference>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct NodeReference {
    pub name: String,
}

impl TryFrom<&MachineResource> for Machine {
    type Error = MupError;

    fn try_from(res: &MachineResource) -> Result<Self> {
        let name = res
            .metadata
            .name
            .clone()
            .ok_or_else(|| MupError::Repository("Machine record without a name".to_string()))?;

        let control_plane_version = res
            .spec
            .versions
            .control_plane
            .clone()
            .filter(|v| !v.is_empty());

        let role = if control_plane_version.is_some() {
            MachineRole::ControlPlane
        } else {
            MachineRole::Worker
        };

        let node_ref = res
            .status
            .as_ref()
            .and_then(|s| s.node_ref.as_ref())
            .map(|r| r.name.clone())
            .filter(|n| !n.is_empty());

        Ok(Self {
            name,
            role,
            kubelet_version: res.spec.versions.kubelet.clone(),
            control_plane_version,
            node_ref,
            resource_version: res.metadata.resource_version.clone(),
        })
    }
}
