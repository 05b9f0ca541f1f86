//! Kubernetes API access: client construction, the Cluster API `Machine`
//! resource, and the repository/oracle implementations backed by them.

pub mod client;
pub mod crd;
pub mod node;
pub mod repository;

pub use node::{KubeNodeOracle, NodeStatusOracle};
pub use repository::{KubeMachineRepository, MachineRepository};
