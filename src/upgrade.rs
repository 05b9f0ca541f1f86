//! Rolling cluster upgrade: control plane first, then workers concurrently.

pub mod coordinator;
pub mod plan;
pub mod poller;
pub mod readiness;
pub mod workers;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;
use std::time::Duration;

use crate::k8s::{MachineRepository, NodeStatusOracle};

pub use coordinator::upgrade_cluster;
pub use poller::PollSettings;

/// Connections to the cluster, shared by the coordinator and all worker tasks.
#[derive(Clone)]
pub struct ClusterHandle {
    pub repository: Arc<dyn MachineRepository>,
    pub oracle: Arc<dyn NodeStatusOracle>,
}

impl ClusterHandle {
    pub fn new(repository: Arc<dyn MachineRepository>, oracle: Arc<dyn NodeStatusOracle>) -> Self {
        Self { repository, oracle }
    }
}

/// Tunables of an upgrade run.
#[derive(Clone, Copy, Debug)]
pub struct UpgradeSettings {
    /// Readiness polling used for the control plane and every worker.
    pub poll: PollSettings,
    /// How long cancelled workers may take to wind down before they are aborted.
    pub shutdown_grace: Duration,
    /// Plan only, do not update any machine.
    pub dry_run: bool,
}

impl Default for UpgradeSettings {
    fn default() -> Self {
        Self {
            poll: PollSettings::default(),
            shutdown_grace: Duration::from_secs(30),
            dry_run: false,
        }
    }
}
