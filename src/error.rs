//! Custom error types for mup.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while upgrading cluster machines.
#[derive(Error, Debug)]
pub enum MupError {
    #[error("No control plane machine found")]
    NoControlPlaneFound,

    #[error("Multiple control plane machines found ({}), only single control plane clusters are supported", .0.join(", "))]
    MultipleControlPlanes(Vec<String>),

    #[error("Machine repository error: {0}")]
    Repository(String),

    #[error("Update conflict: {0}")]
    Conflict(String),

    #[error("Node status unavailable: {0}")]
    TransientStatus(String),

    #[error("Failed to update control plane machine {machine}: {source}")]
    ControlPlaneUpdateFailed {
        machine: String,
        #[source]
        source: Box<Self>,
    },

    #[error("Control plane machine {machine} did not become ready: {source}")]
    ControlPlaneTimeout {
        machine: String,
        #[source]
        source: Box<Self>,
    },

    #[error("Timeout waiting for {operation} after {}s", .timeout.as_secs())]
    Timeout { operation: String, timeout: Duration },

    #[error("Upgrade of machine {machine} failed: {source}")]
    WorkerFailed {
        machine: String,
        #[source]
        source: Box<Self>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid version format: {0}")]
    InvalidVersion(String),

    #[error("Kubeconfig error: {0}")]
    Kubeconfig(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MupError {
    /// Map a Kubernetes API error, keeping optimistic-concurrency conflicts distinct.
    pub fn kube(context: &str, err: &kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) if resp.code == 409 => {
                Self::Conflict(format!("{context}: {}", resp.message))
            }
            _ => Self::Repository(format!("{context}: {err}")),
        }
    }

    /// Wrap an error as the failure of a specific worker machine.
    pub fn worker(machine: impl Into<String>, source: Self) -> Self {
        Self::WorkerFailed {
            machine: machine.into(),
            source: Box::new(source),
        }
    }

    /// Returns true if this error is expected to clear up on its own.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientStatus(_) | Self::Conflict(_))
    }

    /// Name of the machine this error is attributed to, if any.
    pub fn machine(&self) -> Option<&str> {
        match self {
            Self::ControlPlaneUpdateFailed { machine, .. }
            | Self::ControlPlaneTimeout { machine, .. }
            | Self::WorkerFailed { machine, .. } => Some(machine),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MupError>;
