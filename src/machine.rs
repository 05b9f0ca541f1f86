//! Domain types for machines and the nodes they materialize as.

/// Role a machine plays in the cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MachineRole {
    ControlPlane,
    Worker,
}

impl std::fmt::Display for MachineRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ControlPlane => write!(f, "control-plane"),
            Self::Worker => write!(f, "worker"),
        }
    }
}

/// Desired state of a cluster member, as stored by the cluster API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Machine {
    pub name: String,
    pub role: MachineRole,
    pub kubelet_version: String,
    pub control_plane_version: Option<String>,
    /// Name of the Node this machine materialized as, once provisioned.
    pub node_ref: Option<String>,
    /// Optimistic concurrency token of the record this was read from.
    pub resource_version: Option<String>,
}

impl Machine {
    pub fn is_control_plane(&self) -> bool {
        self.role == MachineRole::ControlPlane
    }

    /// Set the desired versions for an upgrade to `version`.
    ///
    /// Workers only carry a kubelet version; the control plane also
    /// carries its control plane version.
    pub fn set_target_version(&mut self, version: &str) {
        self.kubelet_version = version.to_string();
        if self.is_control_plane() {
            self.control_plane_version = Some(version.to_string());
        }
    }
}

/// Observed state of a running host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub ready: bool,
    pub kubelet_version: String,
}
