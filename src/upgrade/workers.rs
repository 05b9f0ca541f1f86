//! Concurrent worker upgrades.
//!
//! One task per worker machine. Outcomes are consumed in listing order, so the
//! reported failure is always the first failing worker by listing order, no
//! matter which task finishes first. On that failure the remaining tasks are
//! cancelled and drained before returning.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::poller::{PollSettings, wait_until_ready};
use super::readiness::check_machine_ready;
use super::ClusterHandle;
use crate::error::{MupError, Result};
use crate::machine::Machine;

/// Result of one worker task.
#[derive(Debug)]
pub enum WorkerOutcome {
    Upgraded,
    Failed(MupError),
    /// Stopped after a sibling failed.
    Cancelled,
    /// Did not report back, either because it panicked or because it
    /// outlived the shutdown grace period.
    Aborted,
}

impl WorkerOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Upgraded => "upgraded",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
            Self::Aborted => "aborted",
        }
    }
}

#[derive(Debug)]
pub struct MachineOutcome {
    pub machine: String,
    pub outcome: WorkerOutcome,
}

/// Outcome of every worker, in listing order.
#[derive(Debug, Default)]
pub struct FanoutReport {
    pub outcomes: Vec<MachineOutcome>,
}

impl FanoutReport {
    pub fn count(&self, label: &str) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome.label() == label)
            .count()
    }

    /// The first failure in listing order, as a worker error.
    pub fn into_result(self) -> Result<()> {
        for MachineOutcome { machine, outcome } in self.outcomes {
            match outcome {
                WorkerOutcome::Upgraded => {}
                WorkerOutcome::Failed(e) => return Err(MupError::worker(machine, e)),
                WorkerOutcome::Cancelled => return Err(MupError::worker(machine, MupError::Cancelled)),
                WorkerOutcome::Aborted => {
                    return Err(MupError::worker(
                        machine,
                        MupError::Repository("worker task ended without reporting".to_string()),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Upgrade every worker concurrently to `target_version`.
pub async fn upgrade_workers(
    cluster: &ClusterHandle,
    workers: &[Machine],
    target_version: &str,
    poll: PollSettings,
    shutdown_grace: Duration,
) -> FanoutReport {
    let total = workers.len();
    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();
    let mut slot_of: HashMap<task::Id, usize> = HashMap::with_capacity(total);

    for (index, machine) in workers.iter().enumerate() {
        let cluster = cluster.clone();
        let name = machine.name.clone();
        let target = target_version.to_string();
        let cancel = cancel.clone();
        let handle = tasks.spawn(async move {
            upgrade_worker(&cluster, &name, &target, poll, &cancel).await
        });
        slot_of.insert(handle.id(), index);
    }

    let mut slots: Vec<Option<WorkerOutcome>> = (0..total).map(|_| None).collect();
    let mut cursor = 0;
    let mut remaining = total;

    while let Some(joined) = tasks.join_next_with_id().await {
        record(&mut slots, &slot_of, joined);
        remaining -= 1;
        if remaining > 0 {
            info!("{} machines are still being upgraded", remaining);
        }

        if let Some(failed) = advance(&slots, &mut cursor) {
            warn!(
                machine = %workers[failed].name,
                "Worker upgrade failed, cancelling {} outstanding task(s)",
                remaining
            );
            cancel.cancel();
            drain(&mut tasks, &mut slots, &slot_of, shutdown_grace).await;
            break;
        }
    }

    let report = FanoutReport {
        outcomes: workers
            .iter()
            .zip(slots)
            .map(|(m, slot)| MachineOutcome {
                machine: m.name.clone(),
                outcome: slot.unwrap_or(WorkerOutcome::Aborted),
            })
            .collect(),
    };

    for o in &report.outcomes {
        info!(machine = %o.machine, outcome = o.outcome.label(), "Worker outcome");
    }
    info!(
        upgraded = report.count("upgraded"),
        failed = report.count("failed"),
        cancelled = report.count("cancelled"),
        aborted = report.count("aborted"),
        "Worker upgrade summary"
    );

    report
}

/// Store a joined task's outcome in its listing slot.
///
/// A task that panicked or was aborted fills its slot with
/// [`WorkerOutcome::Aborted`], which counts as a failure.
fn record(
    slots: &mut [Option<WorkerOutcome>],
    slot_of: &HashMap<task::Id, usize>,
    joined: std::result::Result<(task::Id, WorkerOutcome), task::JoinError>,
) {
    let (id, outcome) = match joined {
        Ok(joined) => joined,
        Err(e) => {
            if e.is_panic() {
                error!("Worker task panicked: {}", e);
            }
            (e.id(), WorkerOutcome::Aborted)
        }
    };
    if let Some(&index) = slot_of.get(&id) {
        slots[index] = Some(outcome);
    }
}

/// Move `cursor` past leading successes.
///
/// Returns the index of the first failure once every earlier worker has
/// succeeded, or `None` while the next outcome in order is still pending.
fn advance(slots: &[Option<WorkerOutcome>], cursor: &mut usize) -> Option<usize> {
    while let Some(slot) = slots.get(*cursor) {
        match slot {
            None => return None,
            Some(WorkerOutcome::Upgraded) => *cursor += 1,
            Some(_) => return Some(*cursor),
        }
    }
    None
}

/// Wait for cancelled tasks to finish, aborting whatever outlives `grace`.
async fn drain(
    tasks: &mut JoinSet<WorkerOutcome>,
    slots: &mut [Option<WorkerOutcome>],
    slot_of: &HashMap<task::Id, usize>,
    grace: Duration,
) {
    let finished = tokio::time::timeout(grace, async {
        while let Some(joined) = tasks.join_next_with_id().await {
            record(slots, slot_of, joined);
        }
    })
    .await;

    if finished.is_err() {
        warn!(
            "{} worker task(s) still running after {}s grace period, aborting",
            tasks.len(),
            grace.as_secs()
        );
        tasks.shutdown().await;
    }
}

async fn upgrade_worker(
    cluster: &ClusterHandle,
    name: &str,
    target: &str,
    poll: PollSettings,
    cancel: &CancellationToken,
) -> WorkerOutcome {
    match run_worker(cluster, name, target, poll, cancel).await {
        Ok(()) => {
            info!(machine = name, "Worker upgraded");
            WorkerOutcome::Upgraded
        }
        Err(MupError::Cancelled) => {
            info!(machine = name, "Worker upgrade cancelled");
            WorkerOutcome::Cancelled
        }
        Err(e) => {
            if e.is_transient() {
                warn!(machine = name, error = %e, "Worker upgrade failed on a transient error");
            } else {
                error!(machine = name, error = %e, "Worker upgrade failed");
            }
            WorkerOutcome::Failed(e)
        }
    }
}

async fn run_worker(
    cluster: &ClusterHandle,
    name: &str,
    target: &str,
    poll: PollSettings,
    cancel: &CancellationToken,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(MupError::Cancelled);
    }
    info!(machine = name, "Upgrading worker");

    // Re-read so the update is applied to the current record, not the listing snapshot
    let mut machine = cluster.repository.get(name).await?;
    if cancel.is_cancelled() {
        return Err(MupError::Cancelled);
    }

    machine.set_target_version(target);
    let updated = cluster.repository.update(&machine).await?;
    info!(machine = name, version = target, "Worker machine updated, waiting for node");

    let repository = cluster.repository.as_ref();
    let oracle = cluster.oracle.as_ref();
    let machine_name = updated.name.as_str();
    wait_until_ready(
        &format!("machine {machine_name} to run {target}"),
        poll,
        cancel,
        move || check_machine_ready(repository, oracle, machine_name, target),
    )
    .await
}
