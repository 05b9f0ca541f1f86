//! In-memory cluster used by upgrade tests.
//!
//! Implements both [`MachineRepository`] and [`NodeStatusOracle`] and records
//! every update and every node readiness transition in call order.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{MupError, Result};
use crate::k8s::{MachineRepository, NodeStatusOracle};
use crate::machine::{Machine, MachineRole, Node};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Update(String),
    NodeReady(String),
}

/// What happens to a machine's node after its record is updated.
#[derive(Clone, Copy, Debug)]
pub enum Rollout {
    /// The node reports ready at the new version on the n-th poll after the update.
    ReadyAfterPolls(u32),
    NeverReady,
}

#[derive(Clone, Debug)]
struct FakeNode {
    name: String,
    ready: bool,
    version: String,
}

#[derive(Clone, Debug)]
pub struct FakeMachine {
    name: String,
    role: MachineRole,
    kubelet_version: String,
    node: Option<FakeNode>,
    rollout: Rollout,
    update_delay: Duration,
    fail_update: bool,
    panic_on_get: bool,
    resource_version: u64,
    updated_to: Option<String>,
    polls_since_update: u32,
}

impl FakeMachine {
    fn new(name: &str, role: MachineRole) -> Self {
        Self {
            name: name.to_string(),
            role,
            kubelet_version: "1.2.2".to_string(),
            node: Some(FakeNode {
                name: format!("{name}-node"),
                ready: true,
                version: "v1.2.2".to_string(),
            }),
            rollout: Rollout::ReadyAfterPolls(1),
            update_delay: Duration::ZERO,
            fail_update: false,
            panic_on_get: false,
            resource_version: 1,
            updated_to: None,
            polls_since_update: 0,
        }
    }

    pub fn control_plane(name: &str) -> Self {
        Self::new(name, MachineRole::ControlPlane)
    }

    pub fn worker(name: &str) -> Self {
        Self::new(name, MachineRole::Worker)
    }

    pub fn node(mut self, name: &str, ready: bool, version: &str) -> Self {
        self.node = Some(FakeNode {
            name: name.to_string(),
            ready,
            version: version.to_string(),
        });
        self
    }

    pub fn without_node(mut self) -> Self {
        self.node = None;
        self
    }

    pub const fn rollout(mut self, rollout: Rollout) -> Self {
        self.rollout = rollout;
        self
    }

    pub const fn update_delay(mut self, delay: Duration) -> Self {
        self.update_delay = delay;
        self
    }

    pub const fn failing_update(mut self) -> Self {
        self.fail_update = true;
        self
    }

    /// Crash the task that reads this machine's record.
    pub const fn panicking_get(mut self) -> Self {
        self.panic_on_get = true;
        self
    }

    fn to_machine(&self) -> Machine {
        Machine {
            name: self.name.clone(),
            role: self.role,
            kubelet_version: self.kubelet_version.clone(),
            control_plane_version: (self.role == MachineRole::ControlPlane)
                .then(|| self.kubelet_version.clone()),
            node_ref: self.node.as_ref().map(|n| n.name.clone()),
            resource_version: Some(self.resource_version.to_string()),
        }
    }
}

#[derive(Default)]
struct State {
    machines: Vec<FakeMachine>,
    events: Vec<Event>,
    failing_nodes: HashSet<String>,
    fail_list: bool,
}

pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    pub fn new(machines: Vec<FakeMachine>) -> Self {
        Self {
            state: Mutex::new(State {
                machines,
                ..Default::default()
            }),
        }
    }

    pub fn fail_node_lookups(&self, node: &str) {
        self.state.lock().unwrap().failing_nodes.insert(node.to_string());
    }

    pub fn fail_list(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn updates(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Update(name) => Some(name),
                Event::NodeReady(_) => None,
            })
            .collect()
    }

    pub fn machine(&self, name: &str) -> Option<Machine> {
        let state = self.state.lock().unwrap();
        state.machines.iter().find(|m| m.name == name).map(FakeMachine::to_machine)
    }

    fn update_delay(&self, name: &str) -> Duration {
        let state = self.state.lock().unwrap();
        state
            .machines
            .iter()
            .find(|m| m.name == name)
            .map_or(Duration::ZERO, |m| m.update_delay)
    }
}

#[async_trait]
impl MachineRepository for FakeCluster {
    async fn list(&self) -> Result<Vec<Machine>> {
        let state = self.state.lock().unwrap();
        if state.fail_list {
            return Err(MupError::Repository("list refused".to_string()));
        }
        Ok(state.machines.iter().map(FakeMachine::to_machine).collect())
    }

    async fn get(&self, name: &str) -> Result<Machine> {
        let found = {
            let state = self.state.lock().unwrap();
            state.machines.iter().find(|m| m.name == name).cloned()
        };
        match found {
            Some(m) if m.panic_on_get => panic!("lookup of machine {name} crashed"),
            Some(m) => Ok(m.to_machine()),
            None => Err(MupError::Repository(format!("machine {name} not found"))),
        }
    }

    async fn update(&self, machine: &Machine) -> Result<Machine> {
        let delay = self.update_delay(&machine.name);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Update(machine.name.clone()));

        let stored = state
            .machines
            .iter_mut()
            .find(|m| m.name == machine.name)
            .ok_or_else(|| MupError::Repository(format!("machine {} not found", machine.name)))?;

        if stored.fail_update {
            return Err(MupError::Repository(format!(
                "update of {} rejected",
                machine.name
            )));
        }
        if machine.resource_version != Some(stored.resource_version.to_string()) {
            return Err(MupError::Conflict(format!("{} was modified", machine.name)));
        }

        stored.kubelet_version.clone_from(&machine.kubelet_version);
        stored.resource_version += 1;
        stored.updated_to = Some(machine.kubelet_version.clone());
        stored.polls_since_update = 0;
        Ok(stored.to_machine())
    }
}

#[async_trait]
impl NodeStatusOracle for FakeCluster {
    async fn get_node(&self, name: &str) -> Result<Node> {
        let mut state = self.state.lock().unwrap();
        if state.failing_nodes.contains(name) {
            return Err(MupError::TransientStatus(format!("node {name} unreachable")));
        }

        let machine = state
            .machines
            .iter_mut()
            .find(|m| m.node.as_ref().is_some_and(|n| n.name == name))
            .ok_or_else(|| MupError::TransientStatus(format!("node {name} not found")))?;

        let mut became_ready = None;
        if let Some(target) = machine.updated_to.clone() {
            machine.polls_since_update += 1;
            let node = machine.node.as_mut().expect("node present");
            match machine.rollout {
                Rollout::ReadyAfterPolls(n) if machine.polls_since_update >= n => {
                    if !(node.ready && node.version == format!("v{target}")) {
                        became_ready = Some(machine.name.clone());
                    }
                    node.ready = true;
                    node.version = format!("v{target}");
                }
                _ => node.ready = false,
            }
        }

        let node = machine.node.clone().expect("node present");
        if let Some(machine_name) = became_ready {
            state.events.push(Event::NodeReady(machine_name));
        }

        Ok(Node {
            name: node.name,
            ready: node.ready,
            kubelet_version: node.version,
        })
    }
}
