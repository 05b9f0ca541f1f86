//! Upgrade coordinator.
//!
//! Sequences a run through its phases:
//! `Discovering -> UpgradingControlPlane -> UpgradingWorkers -> Completed`,
//! stopping in `ControlPlaneFailed` or `WorkerFailed` on the first error.
//! A dry run stops in `Planned` after discovery.
//! There is no retry at this layer and nothing is rolled back.

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::plan::UpgradePlan;
use super::poller::{PollSettings, wait_until_ready};
use super::readiness::check_machine_ready;
use super::workers::upgrade_workers;
use super::{ClusterHandle, UpgradeSettings};
use crate::error::{MupError, Result};
use crate::machine::Machine;
use crate::version;

/// Phase of an upgrade run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpgradePhase {
    Discovering,
    Planned,
    UpgradingControlPlane,
    ControlPlaneFailed,
    UpgradingWorkers,
    WorkerFailed,
    Completed,
}

impl UpgradePhase {
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Planned | Self::ControlPlaneFailed | Self::WorkerFailed | Self::Completed
        )
    }
}

impl std::fmt::Display for UpgradePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovering => write!(f, "Discovering"),
            Self::Planned => write!(f, "Planned"),
            Self::UpgradingControlPlane => write!(f, "UpgradingControlPlane"),
            Self::ControlPlaneFailed => write!(f, "ControlPlaneFailed"),
            Self::UpgradingWorkers => write!(f, "UpgradingWorkers"),
            Self::WorkerFailed => write!(f, "WorkerFailed"),
            Self::Completed => write!(f, "Completed"),
        }
    }
}

fn enter(phase: UpgradePhase) {
    if phase.is_terminal() {
        info!(%phase, "Upgrade finished");
    } else {
        info!(%phase, "Entering phase");
    }
}

/// Upgrade every machine of the cluster to `target_version`.
///
/// The control plane machine is updated and confirmed ready before any worker
/// is touched. Workers are then upgraded concurrently. Returns the executed
/// plan, or the first error encountered.
pub async fn upgrade_cluster(
    target_version: &str,
    cluster: &ClusterHandle,
    settings: &UpgradeSettings,
) -> Result<UpgradePlan> {
    let target = version::spec_version(target_version)?;
    info!("Starting to upgrade cluster to version: {}", target);

    enter(UpgradePhase::Discovering);
    let machines = cluster.repository.list().await?;
    let plan = UpgradePlan::from_machines(machines, &target)?;
    info!(
        control_plane = %plan.control_plane.name,
        workers = plan.workers.len(),
        "Discovered {} machines",
        plan.machine_count()
    );

    if settings.dry_run {
        enter(UpgradePhase::Planned);
        info!("Dry run: no machines were updated");
        return Ok(plan);
    }

    enter(UpgradePhase::UpgradingControlPlane);
    if let Err(e) = upgrade_control_plane(cluster, &plan.control_plane, &target, settings.poll).await {
        error!(error = %e, "Control plane upgrade failed");
        enter(UpgradePhase::ControlPlaneFailed);
        return Err(e);
    }
    info!("Finished upgrading control plane");

    enter(UpgradePhase::UpgradingWorkers);
    info!("Upgrading {} worker machines", plan.workers.len());
    let report = upgrade_workers(
        cluster,
        &plan.workers,
        &target,
        settings.poll,
        settings.shutdown_grace,
    )
    .await;

    if let Err(e) = report.into_result() {
        enter(UpgradePhase::WorkerFailed);
        return Err(e);
    }

    enter(UpgradePhase::Completed);
    info!("Successfully upgraded the cluster to {}", target);
    Ok(plan)
}

/// Update the control plane machine and wait until its node runs `target`.
async fn upgrade_control_plane(
    cluster: &ClusterHandle,
    control_plane: &Machine,
    target: &str,
    poll: PollSettings,
) -> Result<()> {
    let mut machine = control_plane.clone();
    machine.set_target_version(target);

    let updated = cluster
        .repository
        .update(&machine)
        .await
        .map_err(|e| MupError::ControlPlaneUpdateFailed {
            machine: machine.name.clone(),
            source: Box::new(e),
        })?;
    info!(machine = %updated.name, version = target, "Control plane machine updated, waiting for node");

    // Nothing runs alongside the control plane, so nothing can cancel it
    let cancel = CancellationToken::new();
    let repository = cluster.repository.as_ref();
    let oracle = cluster.oracle.as_ref();
    let name = updated.name.as_str();

    wait_until_ready(
        &format!("control plane machine {name} to run {target}"),
        poll,
        &cancel,
        move || check_machine_ready(repository, oracle, name, target),
    )
    .await
    .map_err(|e| MupError::ControlPlaneTimeout {
        machine: name.to_string(),
        source: Box::new(e),
    })
}
