//! Readiness predicate for an upgraded machine.

use tracing::{debug, info};

use crate::error::Result;
use crate::k8s::{MachineRepository, NodeStatusOracle};
use crate::version;

/// Check whether a machine's node is ready and running `target`.
///
/// Re-reads the machine to follow its node reference, since the node may be
/// replaced during the upgrade. A machine without a node yet is not ready.
pub async fn check_machine_ready(
    repository: &dyn MachineRepository,
    oracle: &dyn NodeStatusOracle,
    machine_name: &str,
    target: &str,
) -> Result<bool> {
    let machine = repository.get(machine_name).await?;

    let Some(node_name) = machine.node_ref else {
        debug!(machine = machine_name, "Machine has no node reference yet");
        return Ok(false);
    };

    let node = oracle.get_node(&node_name).await?;

    if !node.ready {
        debug!(machine = machine_name, node = %node_name, "Node is not ready");
        return Ok(false);
    }

    if version::matches(&node.kubelet_version, target) {
        info!(machine = machine_name, node = %node_name, version = %node.kubelet_version, "Node is ready");
        Ok(true)
    } else {
        debug!(
            machine = machine_name,
            node = %node_name,
            current = %node.kubelet_version,
            target,
            "Kubelet not at target version yet"
        );
        Ok(false)
    }
}
