//! Upgrade planning: role validation and ordering of machines.

use std::fmt::Write as _;

use crate::error::{MupError, Result};
use crate::machine::Machine;

/// Machines to upgrade, split by role.
#[derive(Debug, Clone)]
pub struct UpgradePlan {
    /// Target version as written into machine specs (`MAJOR.MINOR.PATCH`).
    pub target_version: String,
    pub control_plane: Machine,
    /// Workers in listing order.
    pub workers: Vec<Machine>,
}

impl UpgradePlan {
    /// Build a plan from a machine listing.
    ///
    /// Requires exactly one control plane machine. Clusters with several
    /// control plane machines are rejected rather than guessing which one
    /// to upgrade first.
    pub fn from_machines(machines: Vec<Machine>, target_version: &str) -> Result<Self> {
        if machines.is_empty() {
            return Err(MupError::Repository("No machines found".to_string()));
        }

        let (control_planes, workers): (Vec<Machine>, Vec<Machine>) =
            machines.into_iter().partition(Machine::is_control_plane);

        let mut control_planes = control_planes.into_iter();
        let Some(control_plane) = control_planes.next() else {
            return Err(MupError::NoControlPlaneFound);
        };

        let extra: Vec<String> = control_planes.map(|m| m.name).collect();
        if !extra.is_empty() {
            let mut names = vec![control_plane.name];
            names.extend(extra);
            return Err(MupError::MultipleControlPlanes(names));
        }

        Ok(Self {
            target_version: target_version.to_string(),
            control_plane,
            workers,
        })
    }

    /// Total number of machines in the plan.
    pub fn machine_count(&self) -> usize {
        self.workers.len() + 1
    }

    /// Human-readable plan, one machine per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Upgrade plan: {} machine(s) to {}",
            self.machine_count(),
            self.target_version
        );
        let _ = writeln!(out, "Phase [1/2]: Control plane");
        let _ = writeln!(
            out,
            "  {:<30} {} -> {}",
            self.control_plane.name, self.control_plane.kubelet_version, self.target_version
        );
        let _ = writeln!(out, "Phase [2/2]: Workers ({}, concurrent)", self.workers.len());
        if self.workers.is_empty() {
            let _ = writeln!(out, "  (none)");
        }
        for worker in &self.workers {
            let _ = writeln!(
                out,
                "  {:<30} {} -> {}",
                worker.name, worker.kubelet_version, self.target_version
            );
        }
        out
    }
}
